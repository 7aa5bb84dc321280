// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-wide host for the detection model
//!
//! The host is built exactly once at startup and handed to the HTTP
//! layer through `AppState`. It never reloads or swaps its model.

use anyhow::Result;
use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::vision::detector::{Detection, ModelInfo, ObjectDetector, YoloDetector, YoloSettings};

/// Owner of the single, immutable detection model
pub struct ModelHost {
    detector: Arc<dyn ObjectDetector>,
    loaded_at: Instant,
}

impl std::fmt::Debug for ModelHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHost")
            .field("model", &self.detector.info().name)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

impl ModelHost {
    /// Load the YOLO model from disk
    ///
    /// Any failure here is fatal: callers should abort startup rather
    /// than serve without a model.
    pub fn load<P: AsRef<Path>>(model_path: P, settings: YoloSettings) -> Result<Self> {
        let detector = YoloDetector::load(model_path, settings)?;
        let host = Self::from_detector(Arc::new(detector));

        let info = host.info();
        tracing::info!(
            "✅ Model host ready: {} ({} classes, input {}x{}, {})",
            info.name,
            info.class_names.len(),
            info.input_size,
            info.input_size,
            info.execution_provider
        );

        Ok(host)
    }

    /// Wrap an already constructed detector
    pub fn from_detector(detector: Arc<dyn ObjectDetector>) -> Self {
        Self {
            detector,
            loaded_at: Instant::now(),
        }
    }

    /// Shared handle to the detector
    pub fn detector(&self) -> Arc<dyn ObjectDetector> {
        Arc::clone(&self.detector)
    }

    /// Run detection with the hosted model
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        self.detector.detect(image)
    }

    pub fn info(&self) -> ModelInfo {
        self.detector.info()
    }

    /// Time since the model was loaded
    pub fn uptime(&self) -> Duration {
        self.loaded_at.elapsed()
    }
}
