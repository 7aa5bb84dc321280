// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLO output decoding and non-maximum suppression

use anyhow::Result;
use ndarray::{s, ArrayView2};
use serde::{Deserialize, Serialize};

/// Upper bound on candidates entering NMS
pub const MAX_NMS_CANDIDATES: usize = 30_000;

/// Memory layout of the raw detection tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLayout {
    /// `[1, N, 5 + nc]`: cx, cy, w, h, objectness, class scores (YOLOv5)
    Anchors,
    /// `[1, 4 + nc, N]`: cx, cy, w, h, class scores (YOLOv8 and later)
    Transposed,
}

impl OutputLayout {
    /// Number of leading box/objectness values per candidate
    pub fn box_channels(&self) -> usize {
        match self {
            OutputLayout::Anchors => 5,
            OutputLayout::Transposed => 4,
        }
    }

    /// Work out the layout and class count from an output shape
    ///
    /// When the class count is known (from labels) the shape must agree
    /// with it; otherwise the longer axis is taken as the candidate axis.
    pub fn resolve(shape: &[usize], num_classes: Option<usize>) -> Result<(Self, usize)> {
        if shape.len() != 3 || shape[0] != 1 {
            anyhow::bail!(
                "Unexpected detection output shape: {:?}, expected [1, N, C] or [1, C, N]",
                shape
            );
        }
        let (rows, cols) = (shape[1], shape[2]);

        match num_classes {
            Some(nc) if nc > 0 => {
                if cols == nc + 5 {
                    Ok((OutputLayout::Anchors, nc))
                } else if rows == nc + 4 {
                    Ok((OutputLayout::Transposed, nc))
                } else {
                    anyhow::bail!(
                        "Detection output shape {:?} does not match {} class labels",
                        shape,
                        nc
                    )
                }
            }
            _ => {
                if rows > cols && cols > 5 {
                    Ok((OutputLayout::Anchors, cols - 5))
                } else if cols >= rows && rows > 4 {
                    Ok((OutputLayout::Transposed, rows - 4))
                } else {
                    anyhow::bail!("Cannot infer class count from output shape {:?}", shape)
                }
            }
        }
    }
}

/// A scored box in model input space, before rescaling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// x1, y1, x2, y2
    pub bbox: [f32; 4],
    pub score: f32,
    pub class_id: usize,
}

impl Candidate {
    pub fn area(&self) -> f32 {
        (self.bbox[2] - self.bbox[0]).max(0.0) * (self.bbox[3] - self.bbox[1]).max(0.0)
    }
}

/// Intersection over union of two xyxy candidates
pub fn iou(a: &Candidate, b: &Candidate) -> f32 {
    let inter_x1 = a.bbox[0].max(b.bbox[0]);
    let inter_y1 = a.bbox[1].max(b.bbox[1]);
    let inter_x2 = a.bbox[2].min(b.bbox[2]);
    let inter_y2 = a.bbox[3].min(b.bbox[3]);

    let inter_area = (inter_x2 - inter_x1).max(0.0) * (inter_y2 - inter_y1).max(0.0);
    let union_area = a.area() + b.area() - inter_area;
    if union_area <= 0.0 {
        0.0
    } else {
        inter_area / union_area
    }
}

/// Decode candidate rows (one candidate per row) into scored boxes
///
/// Rows whose best score does not exceed `conf_threshold` are dropped.
/// For the anchor layout the objectness gate is applied first and the
/// class score is multiplied by it.
pub fn decode_candidates(
    rows: ArrayView2<f32>,
    layout: OutputLayout,
    conf_threshold: f32,
) -> Vec<Candidate> {
    let offset = layout.box_channels();
    let mut candidates = Vec::new();

    if rows.ncols() <= offset {
        return candidates;
    }

    for row in rows.outer_iter() {
        let objectness = match layout {
            OutputLayout::Anchors => {
                let obj = row[4];
                if obj <= conf_threshold {
                    continue;
                }
                obj
            }
            OutputLayout::Transposed => 1.0,
        };

        let (class_id, best) = row
            .slice(s![offset..])
            .iter()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |(best_id, best), (i, &v)| {
                if v > best {
                    (i, v)
                } else {
                    (best_id, best)
                }
            });

        let score = best * objectness;
        if score <= conf_threshold {
            continue;
        }

        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        candidates.push(Candidate {
            bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
            score,
            class_id,
        });
    }

    candidates
}

/// Class-aware greedy NMS
///
/// Returns at most `max_detections` candidates, sorted by descending score.
/// Boxes of different classes never suppress each other.
pub fn non_max_suppression(
    mut candidates: Vec<Candidate>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(MAX_NMS_CANDIDATES);

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && iou(k, &candidate) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }

    kept
}
