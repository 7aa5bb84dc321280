// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection endpoint handler

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use axum_extra::extract::multipart::{Multipart, MultipartRejection};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::request::{read_upload, DetectQuery};
use super::response::DetectionResponse;
use crate::api::errors::{ApiError, ApiErrorResponse};
use crate::api::http_server::AppState;
use crate::vision::image_utils::format_to_extension;
use crate::vision::{decode_image_bytes, AnnotationSink, Detection, ModelHost};

/// POST /detect - Detect objects in an uploaded image
///
/// Accepts a `multipart/form-data` body with the image in field `file`
/// and returns one row per detected object.
///
/// # Query
/// - `orient`: `index` (default), `records`, or `columns`
///
/// # Response
/// `{"0": {"xmin", "ymin", "xmax", "ymax", "confidence", "class", "name"}, ...}`
/// with coordinates in original image pixels, sorted by confidence.
/// An image with no detections yields `{}`.
///
/// # Errors
/// - 400 Bad Request: missing file field, malformed form, undecodable image
/// - 413 Payload Too Large: upload exceeds the configured limit
/// - 500 Internal Server Error: inference failed
pub async fn detect_handler(
    State(state): State<AppState>,
    query: Result<Query<DetectQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectionResponse>, ApiErrorResponse> {
    let request_id = Uuid::new_v4().to_string();
    let start = Instant::now();

    // 1. Validate query and form
    let Query(query) = query.map_err(|e| {
        warn!("[{}] Invalid query: {}", request_id, e.body_text());
        ApiError::InvalidRequest(e.body_text()).with_request_id(&request_id)
    })?;
    let mut multipart = multipart.map_err(|e| {
        warn!("[{}] Not a multipart request: {}", request_id, e.body_text());
        ApiError::InvalidRequest(e.body_text()).with_request_id(&request_id)
    })?;

    // 2. Pull the image out of the form
    let upload = read_upload(&mut multipart, state.max_upload_bytes)
        .await
        .map_err(|e| {
            warn!("[{}] Upload rejected: {}", request_id, e);
            e.with_request_id(&request_id)
        })?;
    debug!(
        "[{}] Received '{}' ({} bytes, {:?})",
        request_id,
        upload.file_name.as_deref().unwrap_or(&upload.field_name),
        upload.bytes.len(),
        upload.content_type
    );

    // 3. Decode and run the model off the async runtime
    let model_host = Arc::clone(&state.model_host);
    let annotator = state.annotator.clone();
    let max_bytes = state.max_upload_bytes;
    let task_request_id = request_id.clone();

    let detections = tokio::task::spawn_blocking(move || {
        run_detection(
            &model_host,
            annotator.as_deref(),
            &upload.bytes,
            max_bytes,
            &task_request_id,
        )
    })
    .await
    .map_err(|e| {
        warn!("[{}] Detection task failed: {}", request_id, e);
        ApiError::InternalError("detection task failed".to_string()).with_request_id(&request_id)
    })?
    .map_err(|e| {
        warn!("[{}] Detection failed: {}", request_id, e);
        e.with_request_id(&request_id)
    })?;

    // 4. Build response
    let response = DetectionResponse::new(&detections, query.orient);
    if response.table.is_empty() {
        debug!("[{}] No objects above threshold", request_id);
    }
    for row in response.table.rows() {
        debug!(
            "[{}] {} {:.2} [{:.1}, {:.1}, {:.1}, {:.1}]",
            request_id, row.name, row.confidence, row.xmin, row.ymin, row.xmax, row.ymax
        );
    }
    info!(
        "[{}] Detected {} objects in {}ms",
        request_id,
        response.table.len(),
        start.elapsed().as_millis()
    );

    Ok(Json(response))
}

fn run_detection(
    model_host: &ModelHost,
    annotator: Option<&AnnotationSink>,
    bytes: &[u8],
    max_bytes: usize,
    request_id: &str,
) -> Result<Vec<Detection>, ApiError> {
    let (image, image_info) = decode_image_bytes(bytes, max_bytes)?;
    debug!(
        "[{}] Decoded {} image {}x{}",
        request_id,
        format_to_extension(image_info.format),
        image_info.width,
        image_info.height
    );

    let detections = model_host
        .detect(&image)
        .map_err(|e| ApiError::InternalError(format!("inference failed: {}", e)))?;

    if let Some(sink) = annotator {
        if let Err(e) = sink.annotate(&image, &detections, request_id) {
            warn!("[{}] Annotation failed: {}", request_id, e);
        }
    }

    Ok(detections)
}
