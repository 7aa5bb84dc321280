// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLO object detection model backed by ONNX Runtime
//!
//! The model is loaded once, validated with a warm-up inference, and
//! then shared read-only across requests.

use anyhow::{Context, Result};
use image::DynamicImage;
use ndarray::{Array4, Axis, Ix3};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::labels::{load_labels_file, parse_names_metadata, placeholder_labels};
use super::postprocessing::{decode_candidates, non_max_suppression, Candidate, OutputLayout};
use super::preprocessing::{preprocess_for_detection, Letterbox, DEFAULT_INPUT_SIZE};

/// A single detected object in original image pixel space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    /// Confidence score (0.0-1.0)
    pub confidence: f32,
    /// Class index into the model's label list
    pub class_id: usize,
    /// Class label
    pub name: String,
}

/// Description of a loaded detection model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    pub model_path: String,
    pub input_size: u32,
    pub class_names: Vec<String>,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// "cuda" or "cpu"
    pub execution_provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_layout: Option<OutputLayout>,
}

/// Inference interface shared by the HTTP layer
///
/// Implementations must be usable from many request threads at once
/// and must not change observable state between calls.
pub trait ObjectDetector: Send + Sync {
    /// Run detection on a decoded image
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>>;

    /// Static description of the model
    fn info(&self) -> ModelInfo;
}

/// Tunables for YOLO inference
#[derive(Debug, Clone)]
pub struct YoloSettings {
    /// Square model input size (multiple of 32)
    pub input_size: u32,
    /// Minimum score for a detection to be reported
    pub conf_threshold: f32,
    /// IoU above which same-class boxes are suppressed
    pub iou_threshold: f32,
    /// Cap on detections per image
    pub max_detections: usize,
    /// Try the CUDA execution provider first
    pub use_gpu: bool,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
    /// Optional labels file overriding model metadata
    pub labels_path: Option<PathBuf>,
}

impl Default for YoloSettings {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 1000,
            use_gpu: true,
            intra_threads: 4,
            labels_path: None,
        }
    }
}

/// YOLO detector (YOLOv5 anchor exports and YOLOv8-style exports)
pub struct YoloDetector {
    /// ONNX Runtime session; `run` needs exclusive access
    session: Arc<Mutex<Session>>,
    input_name: String,
    layout: OutputLayout,
    class_names: Vec<String>,
    settings: YoloSettings,
    model_path: PathBuf,
    execution_provider: &'static str,
}

impl std::fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloDetector")
            .field("model_path", &self.model_path)
            .field("input_name", &self.input_name)
            .field("layout", &self.layout)
            .field("num_classes", &self.class_names.len())
            .field("execution_provider", &self.execution_provider)
            .finish_non_exhaustive()
    }
}

impl YoloDetector {
    /// Load a YOLO ONNX model from disk
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - ONNX Runtime cannot build a session from the file
    /// - Labels file is configured but unreadable
    /// - The output tensor does not look like a YOLO detection head
    pub fn load<P: AsRef<Path>>(model_path: P, settings: YoloSettings) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Detection model not found: {}", model_path.display());
        }

        info!("Loading detection model from {}", model_path.display());

        let (mut session, execution_provider) = build_session(model_path, &settings)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        let metadata_names = session
            .metadata()
            .ok()
            .and_then(|metadata| metadata.custom("names").ok().flatten());

        let labels = match settings.labels_path {
            Some(ref path) => Some(load_labels_file(path)?),
            None => metadata_names.as_deref().and_then(parse_names_metadata),
        };

        // Warm-up run: validates the graph and tells us the output layout
        let output_shape = {
            let size = settings.input_size as usize;
            let warmup = Value::from_array(Array4::<f32>::zeros((1, 3, size, size)))
                .context("Failed to create warm-up tensor")?;
            let outputs = session
                .run(ort::inputs![input_name.as_str() => warmup])
                .context("Warm-up inference failed")?;
            let output = outputs[0]
                .try_extract_array::<f32>()
                .context("Failed to extract warm-up output tensor")?;
            output.shape().to_vec()
        };

        let (layout, num_classes) =
            OutputLayout::resolve(&output_shape, labels.as_ref().map(Vec::len))?;
        let class_names = labels.unwrap_or_else(|| {
            warn!("No class names found, using placeholders for {} classes", num_classes);
            placeholder_labels(num_classes)
        });

        debug!(
            "Detection model output shape {:?} -> {:?} layout, {} classes",
            output_shape, layout, num_classes
        );
        info!(
            "✅ Detection model loaded ({}, {} classes)",
            execution_provider,
            class_names.len()
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            layout,
            class_names,
            settings,
            model_path: model_path.to_path_buf(),
            execution_provider,
        })
    }

    /// Output layout detected at load time
    pub fn layout(&self) -> OutputLayout {
        self.layout
    }

    /// Class label for an index
    pub fn class_name(&self, class_id: usize) -> String {
        self.class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class{}", class_id))
    }

    /// Run the network and decode raw candidates (before NMS)
    fn infer(&self, input: Array4<f32>) -> Result<Vec<Candidate>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("Detection session lock poisoned"))?;

        let input_value = Value::from_array(input).context("Failed to create input tensor")?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .context("Detection inference failed")?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        let output = output
            .view()
            .into_dimensionality::<Ix3>()
            .context("Detection output is not a 3D tensor")?;
        let batch = output.index_axis(Axis(0), 0);
        let rows = match self.layout {
            OutputLayout::Anchors => batch,
            OutputLayout::Transposed => batch.reversed_axes(),
        };

        Ok(decode_candidates(
            rows,
            self.layout,
            self.settings.conf_threshold,
        ))
    }

    fn to_detection(&self, candidate: &Candidate, geometry: &Letterbox) -> Detection {
        let (xmin, ymin) = geometry.to_original(candidate.bbox[0], candidate.bbox[1]);
        let (xmax, ymax) = geometry.to_original(candidate.bbox[2], candidate.bbox[3]);
        Detection {
            xmin,
            ymin,
            xmax,
            ymax,
            confidence: candidate.score,
            class_id: candidate.class_id,
            name: self.class_name(candidate.class_id),
        }
    }
}

impl ObjectDetector for YoloDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let start = Instant::now();

        let (input, geometry) = preprocess_for_detection(image, self.settings.input_size);
        let candidates = self.infer(input)?;
        let num_candidates = candidates.len();

        let kept = non_max_suppression(
            candidates,
            self.settings.iou_threshold,
            self.settings.max_detections,
        );

        let detections: Vec<Detection> = kept
            .iter()
            .map(|candidate| self.to_detection(candidate, &geometry))
            .collect();

        debug!(
            "Detection: {} candidates -> {} objects in {}ms",
            num_candidates,
            detections.len(),
            start.elapsed().as_millis()
        );

        Ok(detections)
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: self
                .model_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "yolo".to_string()),
            model_path: self.model_path.display().to_string(),
            input_size: self.settings.input_size,
            class_names: self.class_names.clone(),
            conf_threshold: self.settings.conf_threshold,
            iou_threshold: self.settings.iou_threshold,
            max_detections: self.settings.max_detections,
            execution_provider: self.execution_provider.to_string(),
            output_layout: Some(self.layout),
        }
    }
}

/// Build an ORT session, preferring CUDA and falling back to CPU
fn build_session(model_path: &Path, settings: &YoloSettings) -> Result<(Session, &'static str)> {
    if settings.use_gpu {
        info!("   Attempting CUDA execution provider...");
        let cuda_result = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CUDAExecutionProvider::default().build().error_on_failure()])
            .context("Failed to set CUDA execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(settings.intra_threads)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path);

        match cuda_result {
            Ok(session) => return Ok((session, "cuda")),
            Err(e) => {
                warn!("⚠️  CUDA execution provider failed: {}", e);
                warn!("   Falling back to CPU execution provider");
            }
        }
    }

    let session = Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(settings.intra_threads)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .context(format!(
            "Failed to load detection model from {}",
            model_path.display()
        ))?;

    Ok((session, "cpu"))
}
