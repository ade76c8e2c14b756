//! HTTP request handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::error;

use chat_api::InboundCommand;

use crate::models::command::Command;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub hi: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        hi: "deploybot".to_string(),
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// Accept a chat command, store it and reply with the dispatch result
pub async fn command_handler(
    State(state): State<Arc<ServerState>>,
    Json(inbound): Json<InboundCommand>,
) -> Result<impl IntoResponse, StatusCode> {
    let command = Command::from(inbound);

    state.store.insert(command.clone()).await.map_err(|e| {
        error!("Failed to store command {}: {}", command.id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let response = state.router.dispatch(&command).await.map_err(|e| {
        error!("Command {} failed: {}", command.id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(response))
}
