use crate::commands::{outcome, run_command, CommandContext};
use crate::config::AppConfig;
use crate::layers::{LayerArgs, LayerCache, LayerError};
use crate::store::MinzClient;
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

pub struct AppState {
    pub layers: LayerCache,
    pub store: MinzClient,
    pub config: AppConfig,
}

#[derive(Deserialize)]
pub struct QueryRequest {
    #[serde(rename = "formato")]
    format: String,
    #[serde(default)]
    args: LayerArgs,
}

impl IntoResponse for LayerError {
    fn into_response(self) -> Response {
        let status = match self {
            LayerError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            LayerError::UnknownLayer(_) => StatusCode::NOT_FOUND,
        };
        (status, self.to_string()).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let web = ServeDir::new(&state.config.server.web_dir);
    Router::new()
        .route("/api/query", post(query_handler))
        .route("/api/command/:cmd", get(command_handler))
        .fallback_service(web)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, layers: LayerCache, store: MinzClient) -> Result<()> {
    let port = config.server.port;
    let state = Arc::new(AppState {
        layers,
        store,
        config,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn query_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Response {
    match state.layers.query(&request.format, &request.args) {
        Ok(collection) => Json(collection).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn command_handler(
    State(state): State<Arc<AppState>>,
    Path(cmd): Path<String>,
) -> (StatusCode, String) {
    info!("Command {}", cmd);
    let ctx = CommandContext {
        config: &state.config,
        store: &state.store,
        layers: &state.layers,
    };
    let result = run_command(&cmd, &ctx).await;
    if let Err(e) = &result {
        error!("Command {} failed: {:?}", cmd, e);
    }
    outcome(&result)
}
