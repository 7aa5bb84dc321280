// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLO object detection on ONNX Runtime
//!
//! Components:
//! - `preprocessing` - Letterbox resize and tensor conversion
//! - `postprocessing` - Output decoding and NMS
//! - `labels` - Class name resolution
//! - `model` - Detector trait and the YOLO implementation

pub mod labels;
pub mod model;
pub mod postprocessing;
pub mod preprocessing;

pub use model::{Detection, ModelInfo, ObjectDetector, YoloDetector, YoloSettings};
pub use postprocessing::{Candidate, OutputLayout};
pub use preprocessing::{Letterbox, DEFAULT_INPUT_SIZE};
