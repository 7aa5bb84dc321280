// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection request parsing

use axum::http::StatusCode;
use axum_extra::extract::Multipart;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::errors::ApiError;

/// Preferred multipart field name for the image
pub const FILE_FIELD: &str = "file";

/// Shape of the detection table in the response body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orient {
    /// `{"0": {..row..}, "1": {..row..}}`
    #[default]
    Index,
    /// `[{..row..}, {..row..}]`
    Records,
    /// `{"xmin": {"0": .., "1": ..}, ..}`
    Columns,
}

/// Query parameters accepted by POST /detect
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectQuery {
    #[serde(default)]
    pub orient: Orient,
}

/// An image file pulled out of a multipart form
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Read the uploaded image from a multipart form
///
/// Picks the field named `file`; otherwise the first field that carries
/// a file name. Remaining fields are ignored.
pub async fn read_upload(
    multipart: &mut Multipart,
    max_bytes: usize,
) -> Result<UploadedImage, ApiError> {
    let mut fallback: Option<UploadedImage> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(multipart_error(e.status(), e.body_text(), max_bytes)),
        };

        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let is_named_file = field_name == FILE_FIELD;

        if !is_named_file && (file_name.is_none() || fallback.is_some()) {
            debug!("Skipping multipart field '{}'", field_name);
            continue;
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e.status(), e.body_text(), max_bytes))?;

        let upload = UploadedImage {
            field_name,
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        };

        if is_named_file {
            return Ok(upload);
        }
        fallback = Some(upload);
    }

    fallback.ok_or_else(|| {
        ApiError::InvalidRequest(format!(
            "multipart form must contain an image file in field '{}'",
            FILE_FIELD
        ))
    })
}

fn multipart_error(status: StatusCode, body: String, max_bytes: usize) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge {
            size: None,
            limit: max_bytes,
        }
    } else {
        ApiError::InvalidRequest(format!("malformed multipart body: {}", body))
    }
}
