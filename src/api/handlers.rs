use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

use super::{ConversationRequest, HealthResponse};
use crate::api::routes::AppState;
use crate::error::AppError;
use crate::relay::ConversationResponse;

pub async fn conversation(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ConversationRequest>, JsonRejection>,
) -> Result<Json<ConversationResponse>, AppError> {
    let Json(request) = payload
        .map_err(|e| AppError::InvalidInput(format!("Invalid request body: {}", e.body_text())))?;

    let prompt = request.prompt.unwrap_or_default();
    let response = state.relay.handle(&prompt).await?;

    Ok(Json(response))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        text_only: state.relay.is_text_only(),
    })
}
