// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Crop module — aspect-locked crop geometry, rendering, and the `crop`
// entry point with its fall-back-to-original policy.

pub mod geometry;
pub mod render;

use cardcrop_core::error::Result;
use cardcrop_core::{CardCropConfig, CardCropError, CropBounds, OutputFormat};
use image::DynamicImage;
use tracing::{info, instrument, warn};

use crate::image::processor::{self, ImageProcessor};

pub use geometry::{adjust_to_aspect, bounds_from_rectangle, compute_smart_bounds};
pub use render::render_crop;

/// Encoded result of a crop request.
#[derive(Debug, Clone, PartialEq)]
pub struct CropOutput {
    /// Encoded crop, or the untouched input bytes after a fallback.
    pub bytes: Vec<u8>,
    /// Bounds actually used, after aspect adjustment. `None` after a fallback.
    pub bounds: Option<CropBounds>,
    /// Format of `bytes`. `None` after a fallback (the input's own format).
    pub format: Option<OutputFormat>,
    pub fell_back: bool,
}

/// Crops card images with a shared configuration.
#[derive(Debug, Clone, Default)]
pub struct Cropper {
    config: CardCropConfig,
}

impl Cropper {
    pub fn new(config: CardCropConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CardCropConfig {
        &self.config
    }

    /// Crop with the configured output size and format.
    pub fn crop_default(&self, data: &[u8], bounds: CropBounds) -> Result<CropOutput> {
        let crop = &self.config.crop;
        self.crop(data, bounds, crop.output_width, crop.output_height, crop.format)
    }

    /// Crop `bounds` out of the encoded image `data`.
    ///
    /// Decode, render and encode failures never surface: the original bytes
    /// come back with `fell_back` set.
    #[instrument(skip(self, data), fields(data_len = data.len()))]
    pub fn crop(
        &self,
        data: &[u8],
        bounds: CropBounds,
        out_w: u32,
        out_h: u32,
        format: OutputFormat,
    ) -> Result<CropOutput> {
        let result = processor::decode(data)
            .and_then(|image| self.crop_decoded(&image, bounds, out_w, out_h, format));
        match result {
            Err(err) if err.is_recoverable_by_fallback() => {
                warn!(error = %err, "Crop failed; returning original image");
                Ok(CropOutput {
                    bytes: data.to_vec(),
                    bounds: None,
                    format: None,
                    fell_back: true,
                })
            }
            result => result,
        }
    }

    /// Like [`Cropper::crop`] but surfaces every failure.
    #[instrument(skip(self, data), fields(data_len = data.len()))]
    pub fn try_crop(
        &self,
        data: &[u8],
        bounds: CropBounds,
        out_w: u32,
        out_h: u32,
        format: OutputFormat,
    ) -> Result<CropOutput> {
        let image = processor::decode(data)?;
        self.crop_decoded(&image, bounds, out_w, out_h, format)
    }

    /// Aspect-lock `bounds` to the output canvas, render, and encode.
    ///
    /// Bounds without a finite, positive area are rejected with `EmptyCrop`;
    /// callers that want a default window pass [`Cropper::smart_bounds`].
    pub fn crop_decoded(
        &self,
        image: &DynamicImage,
        bounds: CropBounds,
        out_w: u32,
        out_h: u32,
        format: OutputFormat,
    ) -> Result<CropOutput> {
        if !bounds.is_valid() {
            return Err(CardCropError::EmptyCrop {
                width: bounds.width.max(0.0) as u32,
                height: bounds.height.max(0.0) as u32,
            });
        }
        let target_aspect = if out_h > 0 {
            out_w as f64 / out_h as f64
        } else {
            self.config.card_aspect
        };
        let adjusted = adjust_to_aspect(bounds, image.width(), image.height(), target_aspect, &self.config);

        let rendered = render_crop(image, &adjusted, out_w, out_h)?;
        let bytes = ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(rendered)).encode(format)?;

        info!(
            x = adjusted.x,
            y = adjusted.y,
            width = adjusted.width,
            height = adjusted.height,
            encoded = bytes.len(),
            "Crop rendered"
        );
        Ok(CropOutput {
            bytes,
            bounds: Some(adjusted),
            format: Some(format),
            fell_back: false,
        })
    }

    /// Smart default bounds for a decoded image.
    pub fn smart_bounds(&self, image: &DynamicImage) -> CropBounds {
        compute_smart_bounds(image.width(), image.height(), &self.config)
    }
}
