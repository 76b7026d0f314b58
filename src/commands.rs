use crate::config::AppConfig;
use crate::datasets::DATASETS;
use crate::import::{import_dataset, ImportError};
use crate::layers::LayerCache;
use crate::prepare::prepare_files;
use crate::provision::provision;
use crate::store::{DimensionalStore, StoreError};
use axum::http::StatusCode;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum CommandError {
    /// Expected failure with a message meant for the caller, such as a store
    /// rejection or an unknown command.
    #[error("{0}")]
    Domain(String),
    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl CommandError {
    pub fn status(&self) -> StatusCode {
        match self {
            CommandError::Domain(_) => StatusCode::UNAUTHORIZED,
            CommandError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Status { body, .. } => CommandError::Domain(body),
            other => CommandError::Internal {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}

impl From<ImportError> for CommandError {
    fn from(e: ImportError) -> Self {
        match e {
            ImportError::Store(store) => store.into(),
            ImportError::UnknownDataset(_) => CommandError::Domain(e.to_string()),
            other => CommandError::Internal {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(e: anyhow::Error) -> Self {
        CommandError::Internal {
            message: format!("{:#}", e),
            source: Some(e.into()),
        }
    }
}

pub struct CommandContext<'a> {
    pub config: &'a AppConfig,
    pub store: &'a dyn DimensionalStore,
    pub layers: &'a LayerCache,
}

/// Datasets named by an import argument; `all` expands to every layout.
pub fn dataset_keys(arg: &str) -> Vec<&str> {
    if arg == "all" {
        DATASETS.iter().map(|d| d.key).collect()
    } else {
        vec![arg]
    }
}

/// Runs the command `name`: `init-store`, `prepare-files`,
/// `import-<dataset>` or `import-all`.
pub async fn run_command(name: &str, ctx: &CommandContext<'_>) -> Result<(), CommandError> {
    match name {
        "init-store" => {
            provision(ctx.store, &ctx.layers.macrozones, &ctx.layers.stations).await?;
        }
        "prepare-files" => {
            prepare_files(ctx.config).await?;
        }
        _ => {
            let Some(dataset) = name.strip_prefix("import-") else {
                return Err(CommandError::Domain(format!("Command '{}' not implemented", name)));
            };
            let tz = ctx.config.time_zone()?;
            for key in dataset_keys(dataset) {
                import_dataset(ctx.store, key, &ctx.config.input.csv_dir, tz).await?;
            }
        }
    }
    Ok(())
}

/// Status and body the dispatcher answers with.
pub fn outcome(result: &Result<(), CommandError>) -> (StatusCode, String) {
    match result {
        Ok(()) => (StatusCode::OK, "Ok".to_string()),
        Err(CommandError::Domain(message)) => (StatusCode::UNAUTHORIZED, message.clone()),
        Err(e @ CommandError::Internal { .. }) => (e.status(), "Internal Error".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{Call, MemoryStore};
    use crate::testutil::collection;

    fn config(csv_dir: &std::path::Path) -> AppConfig {
        AppConfig::from_toml(&format!(
            r#"
            [input]
            resources_dir = {:?}
            csv_dir = {:?}
            [store]
            url = "http://localhost:1"
            [server]
            port = 0
            "#,
            csv_dir, csv_dir
        ))
        .unwrap()
    }

    fn empty_layers() -> LayerCache {
        LayerCache {
            macrozones: collection(vec![]),
            stations: collection(vec![]),
        }
    }

    #[tokio::test]
    async fn init_store_answers_ok() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let layers = empty_layers();
        let store = MemoryStore::default();
        let ctx = CommandContext {
            config: &config,
            store: &store,
            layers: &layers,
        };
        let result = run_command("init-store", &ctx).await;
        assert_eq!(outcome(&result), (StatusCode::OK, "Ok".to_string()));
        assert!(!store.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_command_is_a_domain_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let layers = empty_layers();
        let store = MemoryStore::default();
        let ctx = CommandContext {
            config: &config,
            store: &store,
            layers: &layers,
        };
        let result = run_command("dropAll", &ctx).await;
        let (status, body) = outcome(&result);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("dropAll"));
    }

    #[tokio::test]
    async fn store_rejection_is_a_domain_error_with_body() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("toxinas.csv"),
            "e,p,f,r,m\n101,PSMB,02/01/2019,Chorito,+\n",
        )
        .unwrap();
        let config = config(dir.path());
        let layers = empty_layers();
        let store = MemoryStore::failing_after(0);
        let ctx = CommandContext {
            config: &config,
            store: &store,
            layers: &layers,
        };
        let result = run_command("import-toxinas", &ctx).await;
        assert_eq!(
            outcome(&result),
            (StatusCode::UNAUTHORIZED, "rejected".to_string())
        );
    }

    #[tokio::test]
    async fn import_all_runs_every_dataset() {
        let dir = tempfile::tempdir().unwrap();
        for d in DATASETS.iter() {
            std::fs::write(dir.path().join(d.file_name), "header\n").unwrap();
        }
        let config = config(dir.path());
        let layers = empty_layers();
        let store = MemoryStore::default();
        let ctx = CommandContext {
            config: &config,
            store: &store,
            layers: &layers,
        };
        let result = run_command("import-all", &ctx).await;
        assert_eq!(outcome(&result), (StatusCode::OK, "Ok".to_string()));
        let deletes: Vec<Call> = store
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::DeletePeriod(_)))
            .collect();
        assert_eq!(deletes.len(), DATASETS.len());
    }

    #[test]
    fn dataset_keys_expand_all() {
        assert_eq!(dataset_keys("all").len(), DATASETS.len());
        assert_eq!(dataset_keys("toxinas"), ["toxinas"]);
    }

    #[tokio::test]
    async fn missing_csv_is_internal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let layers = empty_layers();
        let store = MemoryStore::default();
        let ctx = CommandContext {
            config: &config,
            store: &store,
            layers: &layers,
        };
        let result = run_command("import-oxigeno", &ctx).await;
        assert_eq!(outcome(&result).0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn store_errors_map_by_kind() {
        let err = CommandError::from(StoreError::Status {
            status: StatusCode::NOT_FOUND,
            body: "no such dimension".to_string(),
        });
        assert!(matches!(err, CommandError::Domain(ref m) if m == "no such dimension"));

        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = CommandError::from(StoreError::Decode(decode));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
