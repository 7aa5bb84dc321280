// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Shared helpers for API tests: a stub detector and multipart builders

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, Response},
    Router,
};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`
use yolo_detect_node::{
    api::{create_router, AppState},
    vision::{Detection, ModelHost, ModelInfo, ObjectDetector},
};

pub const BOUNDARY: &str = "detect-test-boundary";

/// Deterministic detector returning a fixed list of boxes
pub struct StubDetector {
    detections: Vec<Detection>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl StubDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        let mut stub = Self::new(Vec::new());
        stub.fail = true;
        stub
    }
}

impl ObjectDetector for StubDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("session run failed");
        }
        Ok(self.detections.clone())
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: "stub".to_string(),
            model_path: "stub.onnx".to_string(),
            input_size: 640,
            class_names: vec!["with_mask".to_string(), "without_mask".to_string()],
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 1000,
            execution_provider: "cpu".to_string(),
            output_layout: None,
        }
    }
}

/// Two mask detections in descending confidence order
pub fn mask_detections() -> Vec<Detection> {
    vec![
        Detection {
            xmin: 12.0,
            ymin: 8.0,
            xmax: 40.0,
            ymax: 44.0,
            confidence: 0.91,
            class_id: 0,
            name: "with_mask".to_string(),
        },
        Detection {
            xmin: 50.0,
            ymin: 10.0,
            xmax: 70.0,
            ymax: 38.0,
            confidence: 0.62,
            class_id: 1,
            name: "without_mask".to_string(),
        },
    ]
}

pub fn state_with(detector: Arc<StubDetector>) -> AppState {
    AppState::new(Arc::new(ModelHost::from_detector(detector)))
}

pub fn app_with(detector: Arc<StubDetector>) -> Router {
    create_router(state_with(detector))
}

/// Encode a small solid image in the given format
pub fn encoded_image(format: ImageFormat) -> Vec<u8> {
    let image = DynamicImage::new_rgb8(96, 64);
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

/// Build a multipart body with a single file part
pub fn multipart_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Build a multipart body with a plain text field only
pub fn text_only_body(field: &str, value: &str) -> Vec<u8> {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"\r\n\r\n{v}\r\n--{b}--\r\n",
        b = BOUNDARY,
        f = field,
        v = value
    )
    .into_bytes()
}

pub fn detect_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
