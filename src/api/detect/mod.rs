// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection API endpoint module
//!
//! Provides POST /detect (and its /v1/detect alias) for object detection
//! on uploaded images.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::detect_handler;
pub use request::{DetectQuery, Orient, UploadedImage};
pub use response::{DetectionRecord, DetectionResponse, DetectionTable};
