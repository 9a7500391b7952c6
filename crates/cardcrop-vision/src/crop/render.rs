// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Crop rendering — map a source window onto a fixed-size card canvas.

use cardcrop_core::error::{CardCropError, Result};
use cardcrop_core::CropBounds;
use image::{DynamicImage, RgbaImage};
use tracing::{debug, instrument};

use crate::image::processor::ImageProcessor;

/// Whole-pixel region `(x, y, width, height)` covered by `bounds` inside a
/// `image_w` x `image_h` image.
pub fn pixel_region(bounds: &CropBounds, image_w: u32, image_h: u32) -> Result<(u32, u32, u32, u32)> {
    if !bounds.is_valid() {
        return Err(CardCropError::EmptyCrop {
            width: 0,
            height: 0,
        });
    }

    let (img_w, img_h) = (image_w as f64, image_h as f64);
    let x0 = bounds.x.round().clamp(0.0, img_w);
    let y0 = bounds.y.round().clamp(0.0, img_h);
    let x1 = (bounds.x + bounds.width).round().clamp(x0, img_w);
    let y1 = (bounds.y + bounds.height).round().clamp(y0, img_h);

    let width = (x1 - x0) as u32;
    let height = (y1 - y0) as u32;
    if width == 0 || height == 0 {
        return Err(CardCropError::EmptyCrop { width, height });
    }
    Ok((x0 as u32, y0 as u32, width, height))
}

/// Crop `bounds` out of `source` and resample it onto an `out_w` x `out_h`
/// canvas. The source is left untouched.
#[instrument(skip(source), fields(src_w = source.width(), src_h = source.height()))]
pub fn render_crop(source: &DynamicImage, bounds: &CropBounds, out_w: u32, out_h: u32) -> Result<RgbaImage> {
    if out_w == 0 || out_h == 0 {
        return Err(CardCropError::EmptyCrop {
            width: out_w,
            height: out_h,
        });
    }

    let (x, y, width, height) = pixel_region(bounds, source.width(), source.height())?;
    debug!(x, y, width, height, out_w, out_h, "Rendering crop");

    let rendered = ImageProcessor::from_dynamic(source.crop_imm(x, y, width, height))
        .resize_exact(out_w, out_h)
        .into_rgba();
    Ok(rendered)
}
