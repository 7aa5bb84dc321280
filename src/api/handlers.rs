// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{OriginalUri, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::errors::{ApiError, ApiErrorResponse};
use crate::api::http_server::AppState;
use crate::vision::ModelInfo;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub uptime_seconds: u64,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}

/// GET /health - Liveness plus the hosted model name
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model: state.model_host.info().name,
        uptime_seconds: state.model_host.uptime().as_secs(),
        version: crate::version::VERSION_NUMBER.to_string(),
    })
}

/// GET /v1/models - Describe the loaded detection model
pub async fn models_handler(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: vec![state.model_host.info()],
    })
}

/// GET /version - Build version and enabled features
pub async fn version_handler() -> Json<serde_json::Value> {
    Json(crate::version::get_version_info())
}

/// Fallback for unknown routes
pub async fn not_found_handler(OriginalUri(uri): OriginalUri) -> ApiErrorResponse {
    ApiError::NotFound(format!("no route for {}", uri.path())).into()
}
