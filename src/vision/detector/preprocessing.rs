// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for YOLO detection models

use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

/// Default square input size for YOLO exports
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Gray used to pad letterboxed images (matches YOLO training)
pub const LETTERBOX_FILL: Rgb<u8> = Rgb([114, 114, 114]);

/// Geometry of a letterbox transform, needed to map boxes back
/// into the original image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Resize ratio applied to the original image
    pub gain: f32,
    /// Horizontal padding (left edge) in model input pixels
    pub pad_x: f32,
    /// Vertical padding (top edge) in model input pixels
    pub pad_y: f32,
    /// Original image width
    pub orig_width: u32,
    /// Original image height
    pub orig_height: u32,
}

impl Letterbox {
    /// Map a point from model input space to original image space,
    /// clipped to the original image bounds
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let ox = (x - self.pad_x) / self.gain;
        let oy = (y - self.pad_y) / self.gain;
        (
            ox.clamp(0.0, self.orig_width as f32),
            oy.clamp(0.0, self.orig_height as f32),
        )
    }
}

/// Resize with aspect ratio preservation and pad to a square canvas
///
/// Padding is split evenly between both sides, the same way YOLO
/// letterboxes its inputs, so exported models see familiar geometry.
pub fn letterbox(image: &DynamicImage, target_size: u32) -> (RgbImage, Letterbox) {
    let (orig_w, orig_h) = image.dimensions();

    if orig_w == 0 || orig_h == 0 {
        return (
            RgbImage::from_pixel(target_size, target_size, LETTERBOX_FILL),
            Letterbox {
                gain: 1.0,
                pad_x: 0.0,
                pad_y: 0.0,
                orig_width: orig_w,
                orig_height: orig_h,
            },
        );
    }

    let gain = (target_size as f32 / orig_w as f32).min(target_size as f32 / orig_h as f32);

    let new_w = ((orig_w as f32 * gain).round() as u32).clamp(1, target_size);
    let new_h = ((orig_h as f32 * gain).round() as u32).clamp(1, target_size);

    let left = ((target_size - new_w) as f32 / 2.0 - 0.1).round().max(0.0) as u32;
    let top = ((target_size - new_h) as f32 / 2.0 - 0.1).round().max(0.0) as u32;

    let resized = image
        .resize_exact(new_w, new_h, FilterType::Triangle)
        .to_rgb8();

    let mut canvas = RgbImage::from_pixel(target_size, target_size, LETTERBOX_FILL);
    image::imageops::replace(&mut canvas, &resized, left as i64, top as i64);

    (
        canvas,
        Letterbox {
            gain,
            pad_x: left as f32,
            pad_y: top as f32,
            orig_width: orig_w,
            orig_height: orig_h,
        },
    )
}

/// Convert an RGB image into a [1, 3, H, W] tensor scaled to 0..1
pub fn to_nchw_tensor(rgb: &RgbImage) -> Array4<f32> {
    let (width, height) = rgb.dimensions();
    let mut tensor = Array4::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    tensor
}

/// Letterbox an image and convert it to the model input tensor
pub fn preprocess_for_detection(image: &DynamicImage, input_size: u32) -> (Array4<f32>, Letterbox) {
    let (canvas, geometry) = letterbox(image, input_size);
    (to_nchw_tensor(&canvas), geometry)
}
