// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::detect::detect_handler;
use super::handlers::{health_handler, models_handler, not_found_handler, version_handler};
use crate::vision::image_utils::DEFAULT_MAX_IMAGE_SIZE;
use crate::vision::{AnnotationSink, ModelHost};

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub model_host: Arc<ModelHost>,
    pub annotator: Option<Arc<AnnotationSink>>,
    pub max_upload_bytes: usize,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("model_host", &self.model_host)
            .field("annotate", &self.annotator.is_some())
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl AppState {
    pub fn new(model_host: Arc<ModelHost>) -> Self {
        Self {
            model_host,
            annotator: None,
            max_upload_bytes: DEFAULT_MAX_IMAGE_SIZE,
        }
    }

    pub fn with_annotator(mut self, annotator: AnnotationSink) -> Self {
        self.annotator = Some(Arc::new(annotator));
        self
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        // Health check
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Models endpoint
        .route("/v1/models", get(models_handler))
        // Detection endpoint
        .route("/detect", post(detect_handler))
        .route("/v1/detect", post(detect_handler))
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(state: AppState, addr: SocketAddr) -> Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
