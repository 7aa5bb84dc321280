// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Tests against a real exported YOLO model
//!
//! Point `MODEL_PATH` at an ONNX export (defaults to the training output
//! path) and run with `cargo test -- --ignored`.

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use tower::util::ServiceExt;
use yolo_detect_node::{
    api::{create_router, AppState},
    config::DEFAULT_MODEL_PATH,
    vision::{
        decode_image_bytes, image_utils::DEFAULT_MAX_IMAGE_SIZE, Detection, ModelHost,
        ObjectDetector, YoloDetector, YoloSettings,
    },
};

fn model_path() -> String {
    std::env::var("MODEL_PATH").unwrap_or_else(|_| DEFAULT_MODEL_PATH.to_string())
}

fn cpu_settings() -> YoloSettings {
    YoloSettings {
        use_gpu: false,
        ..YoloSettings::default()
    }
}

/// White 640x480 frame with a dark block, JPEG encoded
fn sample_jpeg() -> Vec<u8> {
    let mut image = RgbImage::from_pixel(640, 480, Rgb([255, 255, 255]));
    for y in 120..360 {
        for x in 200..440 {
            image.put_pixel(x, y, Rgb([40, 40, 40]));
        }
    }
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    bytes
}

fn assert_well_formed(detections: &[Detection], width: u32, height: u32, classes: usize) {
    for d in detections {
        assert!(d.xmin >= 0.0 && d.xmax <= width as f32, "{:?}", d);
        assert!(d.ymin >= 0.0 && d.ymax <= height as f32, "{:?}", d);
        assert!(d.xmin <= d.xmax && d.ymin <= d.ymax, "{:?}", d);
        assert!((0.0..=1.0).contains(&d.confidence), "{:?}", d);
        assert!(d.class_id < classes, "{:?}", d);
        assert!(!d.name.is_empty());
    }
    assert!(detections
        .windows(2)
        .all(|w| w[0].confidence >= w[1].confidence));
}

/// Test 1: Load the model and report its description
#[test]
#[ignore] // Requires model files
fn test_load_real_model() {
    let detector = YoloDetector::load(model_path(), cpu_settings()).unwrap();
    let info = detector.info();

    assert!(!info.class_names.is_empty());
    assert_eq!(info.input_size, 640);
    assert_eq!(info.execution_provider, "cpu");
    assert_eq!(info.output_layout, Some(detector.layout()));
}

/// Test 2: Uploaded bytes decode and detect with boxes in image pixels
#[test]
#[ignore] // Requires model files
fn test_real_model_detects_on_decoded_upload() {
    let detector = YoloDetector::load(model_path(), cpu_settings()).unwrap();
    let classes = detector.info().class_names.len();

    let (image, info) = decode_image_bytes(&sample_jpeg(), DEFAULT_MAX_IMAGE_SIZE).unwrap();
    assert_eq!((info.width, info.height), (640, 480));

    let detections = detector.detect(&image).unwrap();
    assert_well_formed(&detections, info.width, info.height, classes);
}

/// Test 3: Same image twice yields the same table
#[test]
#[ignore] // Requires model files
fn test_real_model_is_deterministic() {
    let detector = YoloDetector::load(model_path(), cpu_settings()).unwrap();
    let (image, _) = decode_image_bytes(&sample_jpeg(), DEFAULT_MAX_IMAGE_SIZE).unwrap();

    let first = detector.detect(&image).unwrap();
    let second = detector.detect(&image).unwrap();
    assert_eq!(first, second);
}

/// Test 4: Full request through the router with the real model
#[tokio::test]
#[ignore] // Requires model files
async fn test_real_model_behind_router() {
    let host = ModelHost::load(model_path(), cpu_settings()).unwrap();
    let app = create_router(AppState::new(Arc::new(host)));

    let boundary = "real-model-boundary";
    let mut body = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"frame.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n",
        boundary
    )
    .into_bytes();
    body.extend_from_slice(&sample_jpeg());
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/detect")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    for (key, row) in json.as_object().unwrap() {
        assert!(key.parse::<usize>().is_ok());
        for column in ["xmin", "ymin", "xmax", "ymax", "confidence", "class", "name"] {
            assert!(row.get(column).is_some(), "row {} missing {}", key, column);
        }
    }
}
