// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the YOLO Detect Node

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-yolo-detect-2026-10-19";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2026-10-19";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "multipart-upload",
    "yolov5-onnx",
    "yolov8-onnx",
    "class-aware-nms",
    "letterbox-preprocessing",
    "cuda-fallback",
    "response-orient",
    "annotation-sink",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("YOLO Detect Node {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info for API responses
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
    })
}
