// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration
//!
//! Every option is a CLI flag with an environment variable fallback, so
//! the node can be configured from `.env`, the shell, or the command line.

use anyhow::Result;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::vision::image_utils::DEFAULT_MAX_IMAGE_SIZE;
use crate::vision::YoloSettings;

/// Default weights location produced by a YOLOv5 training run + ONNX export
pub const DEFAULT_MODEL_PATH: &str = "./yolov5/runs/train/exp/weights/best.onnx";

/// YOLO Detect Node
#[derive(Parser, Debug, Clone)]
#[command(name = "yolo-detect-node")]
#[command(version)]
#[command(about = "HTTP object detection service backed by a YOLO ONNX model", long_about = None)]
pub struct DetectorConfig {
    /// Path to the ONNX detection model
    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,

    /// Optional class labels file (one name per line); overrides model metadata
    #[arg(long, env = "LABELS_PATH")]
    pub labels_path: Option<PathBuf>,

    /// Address to bind the HTTP server to
    #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port for the HTTP server
    #[arg(long, env = "API_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Minimum confidence for reported detections
    #[arg(long, env = "CONF_THRESHOLD", default_value_t = 0.25)]
    pub conf_threshold: f32,

    /// IoU threshold for non-maximum suppression
    #[arg(long, env = "IOU_THRESHOLD", default_value_t = 0.45)]
    pub iou_threshold: f32,

    /// Maximum detections per image
    #[arg(long, env = "MAX_DETECTIONS", default_value_t = 1000)]
    pub max_detections: usize,

    /// Square model input size
    #[arg(long, env = "INPUT_SIZE", default_value_t = 640)]
    pub input_size: u32,

    /// Try CUDA before falling back to CPU
    #[arg(long, env = "USE_GPU", default_value_t = true, action = clap::ArgAction::Set)]
    pub use_gpu: bool,

    /// ONNX Runtime intra-op threads
    #[arg(long, env = "INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,

    /// Largest accepted upload in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_IMAGE_SIZE)]
    pub max_upload_bytes: usize,

    /// Write annotated copies of every processed image here (development only)
    #[arg(long, env = "ANNOTATE_DIR")]
    pub annotate_dir: Option<PathBuf>,
}

impl DetectorConfig {
    /// Check value ranges that clap cannot express
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.conf_threshold) {
            anyhow::bail!(
                "conf_threshold must be within [0, 1], got {}",
                self.conf_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            anyhow::bail!(
                "iou_threshold must be within [0, 1], got {}",
                self.iou_threshold
            );
        }
        if self.input_size == 0 || self.input_size % 32 != 0 {
            anyhow::bail!(
                "input_size must be a positive multiple of 32, got {}",
                self.input_size
            );
        }
        if self.max_detections == 0 {
            anyhow::bail!("max_detections must be at least 1");
        }
        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be at least 1");
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Inference settings handed to the detector
    pub fn yolo_settings(&self) -> YoloSettings {
        YoloSettings {
            input_size: self.input_size,
            conf_threshold: self.conf_threshold,
            iou_threshold: self.iou_threshold,
            max_detections: self.max_detections,
            use_gpu: self.use_gpu,
            intra_threads: self.intra_threads,
            labels_path: self.labels_path.clone(),
        }
    }
}
