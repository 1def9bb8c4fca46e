use crate::api::AppState;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;

/// Liveness: the process is up and serving requests.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Readiness: the ledger store answers queries.
pub async fn ready(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    state.service.ping().await?;
    Ok(Json(serde_json::json!({"status": "ready"})))
}
