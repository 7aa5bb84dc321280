// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module for object detection
//!
//! This module provides:
//! - Upload decoding with format sniffing
//! - YOLO object detection via ONNX Runtime
//! - A process-wide model host
//! - An optional annotation sink for debugging

pub mod annotate;
pub mod detector;
pub mod image_utils;
pub mod model_host;

pub use annotate::AnnotationSink;
pub use detector::{Detection, ModelInfo, ObjectDetector, YoloDetector, YoloSettings};
pub use image_utils::{decode_image_bytes, detect_format, ImageError, ImageInfo};
pub use model_host::ModelHost;
