//! Axum request handler exposing the validation engine over HTTP.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use pipeval_rules::{EngineConfig, ValidationEngine, ValidationRequest};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "pipeval-web";

#[derive(Clone)]
pub struct AppState {
    pub engine: ValidationEngine,
}

impl AppState {
    pub fn new(engine: ValidationEngine) -> Self {
        Self { engine }
    }
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    time_zone: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/validate", post(validate_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("PIPEVAL_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let engine = ValidationEngine::new(EngineConfig::from_env()?)?;
    serve(engine, port).await
}

pub async fn serve(engine: ValidationEngine, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "listening");
    axum::serve(listener, app(AppState::new(engine))).await?;
    Ok(())
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(HealthBody {
        status: "ok",
        time_zone: state.engine.time_zone().name().to_string(),
    })
    .into_response()
}

async fn validate_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ValidationRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => Json(state.engine.validate_sheet(&request, Utc::now())).into_response(),
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "rejecting validation request");
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: rejection.body_text(),
                }),
            )
                .into_response()
        }
    }
}
