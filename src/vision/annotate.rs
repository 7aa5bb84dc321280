// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Optional development hook that renders detections to disk
//!
//! Disabled unless an output directory is configured. Writes are
//! serialized so concurrent requests never interleave on the sink.

use anyhow::{Context, Result};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::vision::detector::Detection;

/// Box outline thickness in pixels
const BOX_THICKNESS: u32 = 2;

/// Per-class outline colors
const PALETTE: [[u8; 3]; 20] = [
    [0xFF, 0x38, 0x38],
    [0xFF, 0x9D, 0x97],
    [0xFF, 0x70, 0x1F],
    [0xFF, 0xB2, 0x1D],
    [0xCF, 0xD2, 0x31],
    [0x48, 0xF9, 0x0A],
    [0x92, 0xCC, 0x17],
    [0x3D, 0xDB, 0x86],
    [0x1A, 0x93, 0x34],
    [0x00, 0xD4, 0xBB],
    [0x2C, 0x99, 0xA8],
    [0x00, 0xC2, 0xFF],
    [0x34, 0x45, 0x93],
    [0x64, 0x73, 0xFF],
    [0x00, 0x18, 0xEC],
    [0x84, 0x38, 0xFF],
    [0x52, 0x00, 0x85],
    [0xCB, 0x38, 0xFF],
    [0xFF, 0x95, 0xC8],
    [0xFF, 0x37, 0xC7],
];

/// Outline color for a class index
pub fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Draw one hollow rectangle per detection onto a copy of the image
pub fn draw_detections(image: &DynamicImage, detections: &[Detection]) -> RgbImage {
    let mut canvas = image.to_rgb8();

    for detection in detections {
        let color = class_color(detection.class_id);
        let x = detection.xmin.round() as i32;
        let y = detection.ymin.round() as i32;
        let width = (detection.xmax - detection.xmin).round().max(1.0) as u32;
        let height = (detection.ymax - detection.ymin).round().max(1.0) as u32;

        for inset in 0..BOX_THICKNESS {
            let w = width.saturating_sub(2 * inset);
            let h = height.saturating_sub(2 * inset);
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at(x + inset as i32, y + inset as i32).of_size(w, h);
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }
    }

    canvas
}

/// Writes annotated copies of processed images to a directory
#[derive(Debug)]
pub struct AnnotationSink {
    output_dir: PathBuf,
    lock: Mutex<()>,
}

impl AnnotationSink {
    /// Create the sink, creating the output directory if needed
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir).with_context(|| {
            format!(
                "Failed to create annotation directory {}",
                output_dir.display()
            )
        })?;

        Ok(Self {
            output_dir,
            lock: Mutex::new(()),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render detections and save as `detect-<request_id>.png`
    pub fn annotate(
        &self,
        image: &DynamicImage,
        detections: &[Detection],
        request_id: &str,
    ) -> Result<PathBuf> {
        let canvas = draw_detections(image, detections);
        let path = self.output_dir.join(format!("detect-{}.png", request_id));

        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Annotation sink lock poisoned"))?;
        canvas
            .save(&path)
            .with_context(|| format!("Failed to write annotated image {}", path.display()))?;

        debug!("Annotated {} detections -> {}", detections.len(), path.display());
        Ok(path)
    }
}
