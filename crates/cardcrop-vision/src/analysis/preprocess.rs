// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preprocessing — bound the analysis resolution and reduce to luminance.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use tracing::{debug, instrument};

/// Dimensions of the analysis image for a `width` x `height` source whose
/// longest side may not exceed `max_dimension`.
pub fn analysis_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension || max_dimension == 0 {
        return (width, height);
    }
    let scale = max_dimension as f64 / longest as f64;
    let scaled = |side: u32| -> u32 {
        if side == longest {
            max_dimension
        } else {
            ((side as f64 * scale).round() as u32).max(1)
        }
    };
    (scaled(width), scaled(height))
}

/// Downscale oversized images and convert every pixel to luminance.
///
/// The output keeps the RGBA layout with `Y = 0.299R + 0.587G + 0.114B`
/// replicated into R, G and B; alpha is carried over.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn prepare(image: &DynamicImage, max_dimension: u32) -> RgbaImage {
    let (target_w, target_h) = analysis_dimensions(image.width(), image.height(), max_dimension);

    let rgba = image.to_rgba8();
    let resized = if (target_w, target_h) == rgba.dimensions() {
        rgba
    } else {
        debug!(target_w, target_h, "Downscaling for analysis");
        imageops::resize(&rgba, target_w, target_h, FilterType::Triangle)
    };

    to_luminance(&resized)
}

/// Replace each pixel's colour channels with its weighted luminance.
pub fn to_luminance(rgba: &RgbaImage) -> RgbaImage {
    RgbaImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let luma = luminance(r, g, b);
        Rgba([luma, luma, luma, a])
    })
}

/// ITU-R BT.601 luma weights.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    y.round().clamp(0.0, 255.0) as u8
}
