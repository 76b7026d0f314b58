pub mod assign;
pub mod codelists;
pub mod commands;
pub mod config;
pub mod data;
pub mod datasets;
pub mod geometry;
pub mod import;
pub mod layers;
pub mod normalize;
pub mod prepare;
pub mod provision;
pub mod server;
pub mod store;
pub mod types;

#[cfg(test)]
mod testutil;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize the raw layers and assign stations to macrozones and comunas
    Prepare {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Create or update dimensions, rows and variables in the store
    InitStore {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Reload one measurement dataset, or `all` of them
    Import {
        dataset: String,
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the prepared layers and the command dispatcher
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

fn store_client(app_config: &config::AppConfig) -> anyhow::Result<store::MinzClient> {
    Ok(store::MinzClient::new(
        &app_config.store.url,
        app_config.store.token.clone(),
    )?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Prepare { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let summary = prepare::prepare_files(&app_config).await?;
            info!(
                "Prepared {} macrozones and {} stations against {} comunas",
                summary.macrozones, summary.stations, summary.comunas
            );
        }
        Commands::InitStore { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let layers = layers::LayerCache::load(&app_config)?;
            let client = store_client(&app_config)?;
            provision::provision(&client, &layers.macrozones, &layers.stations).await?;
        }
        Commands::Import { dataset, config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let tz = app_config.time_zone()?;
            let client = store_client(&app_config)?;
            for key in commands::dataset_keys(dataset) {
                import::import_dataset(&client, key, &app_config.input.csv_dir, tz).await?;
            }
        }
        Commands::Serve { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            info!("Loading prepared layers...");
            let layers = layers::LayerCache::load(&app_config)?;
            let client = store_client(&app_config)?;
            server::start_server(app_config, layers, client).await?;
        }
    }

    Ok(())
}
