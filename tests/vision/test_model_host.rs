// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Model host tests
//!
//! Verifies that the host:
//! - Refuses to start without a usable model file
//! - Serves concurrent callers from one shared detector
//! - Returns identical results for identical input

use anyhow::Result;
use image::DynamicImage;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use yolo_detect_node::vision::{Detection, ModelHost, ModelInfo, ObjectDetector, YoloSettings};

struct CountingDetector {
    calls: AtomicUsize,
}

impl ObjectDetector for CountingDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Detection {
            xmin: 0.0,
            ymin: 0.0,
            xmax: image.width() as f32,
            ymax: image.height() as f32,
            confidence: 0.5,
            class_id: 0,
            name: "object".to_string(),
        }])
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: "counting".to_string(),
            model_path: "counting.onnx".to_string(),
            input_size: 640,
            class_names: vec!["object".to_string()],
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 1000,
            execution_provider: "cpu".to_string(),
            output_layout: None,
        }
    }
}

#[test]
fn test_missing_model_fails_startup() {
    let err = ModelHost::load("/does/not/exist/best.onnx", YoloSettings::default()).unwrap_err();
    assert!(err.to_string().contains("best.onnx"));
}

#[test]
fn test_corrupt_model_fails_startup() {
    let mut file = tempfile::Builder::new().suffix(".onnx").tempfile().unwrap();
    file.write_all(b"this is not an onnx graph").unwrap();

    let settings = YoloSettings {
        use_gpu: false,
        ..YoloSettings::default()
    };
    assert!(ModelHost::load(file.path(), settings).is_err());
}

#[test]
fn test_concurrent_callers_share_one_detector() {
    let detector = Arc::new(CountingDetector {
        calls: AtomicUsize::new(0),
    });
    let host = Arc::new(ModelHost::from_detector(detector.clone()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let host = Arc::clone(&host);
            std::thread::spawn(move || {
                let image = DynamicImage::new_rgb8(10 + i, 20);
                host.detect(&image).unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let detections = handle.join().unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].xmax, (10 + i) as f32);
    }

    assert_eq!(detector.calls.load(Ordering::SeqCst), 8);
}

#[test]
fn test_identical_input_identical_output() {
    let host = ModelHost::from_detector(Arc::new(CountingDetector {
        calls: AtomicUsize::new(0),
    }));
    let image = DynamicImage::new_rgb8(64, 48);

    assert_eq!(host.detect(&image).unwrap(), host.detect(&image).unwrap());
    assert_eq!(host.info().name, "counting");
}
