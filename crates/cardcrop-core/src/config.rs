// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration. Every tunable constant of the detector and the
// cropper lives here so the two halves never drift apart.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CardCropError, Result};
use crate::types::OutputFormat;

/// Standard trading card proportions (2.5in x 3.5in).
pub const CARD_ASPECT_RATIO: f64 = 2.5 / 3.5;

/// Top-level configuration passed explicitly into every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardCropConfig {
    /// Target `width / height` of a card.
    pub card_aspect: f64,
    pub detection: DetectionConfig,
    pub crop: CropConfig,
}

impl Default for CardCropConfig {
    fn default() -> Self {
        Self {
            card_aspect: CARD_ASPECT_RATIO,
            detection: DetectionConfig::default(),
            crop: CropConfig::default(),
        }
    }
}

/// Settings for preprocessing, edge detection, search, and ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Longest side of the analysis image.
    pub max_dimension: u32,
    /// Gradient magnitude above which a pixel is an edge.
    pub gradient_threshold: u32,
    /// Smallest window width as a fraction of image width.
    pub min_window_fraction: f64,
    /// Lower clamp for the smallest window width, in pixels.
    pub min_window_px: f64,
    /// Upper clamp for the smallest window width, in pixels.
    pub max_window_px: f64,
    /// Multipliers applied to the smallest window size.
    pub window_scales: Vec<f64>,
    /// Minimum sliding stride in pixels.
    pub min_step: u32,
    /// Stride is `min(width, height) / step_divisor` when that is larger.
    pub step_divisor: u32,
    /// Hard cap on scored windows across all sizes.
    pub max_window_evaluations: usize,
    /// Distance between border samples, in pixels.
    pub border_sample_stride: u32,
    pub edge_weight: f64,
    pub aspect_weight: f64,
    /// Windows scoring at or below this are discarded.
    pub min_confidence: f64,
    /// Overlap above which two candidates are duplicates.
    pub iou_threshold: f64,
    /// Reject widths below this fraction of the shorter image side.
    pub min_size_fraction: f64,
    /// Reject widths or heights above this fraction of the longer image side.
    pub max_size_fraction: f64,
    pub min_aspect: f64,
    pub max_aspect: f64,
    pub max_results: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_dimension: 800,
            gradient_threshold: 30,
            min_window_fraction: 0.1,
            min_window_px: 50.0,
            max_window_px: 100.0,
            window_scales: vec![1.0, 1.5, 2.0],
            min_step: 20,
            step_divisor: 20,
            max_window_evaluations: 100,
            border_sample_stride: 5,
            edge_weight: 0.7,
            aspect_weight: 0.3,
            min_confidence: 0.4,
            iou_threshold: 0.3,
            min_size_fraction: 0.05,
            max_size_fraction: 0.9,
            min_aspect: 0.4,
            max_aspect: 2.0,
            max_results: 10,
        }
    }
}

/// Settings for crop geometry and rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    pub output_width: u32,
    pub output_height: u32,
    pub format: OutputFormat,
    /// Smart bounds start at this fraction of the image width.
    pub smart_width_fraction: f64,
    /// Smart bounds never exceed this fraction of the image height.
    pub smart_max_height_fraction: f64,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            output_width: 300,
            output_height: 420,
            format: OutputFormat::default(),
            smart_width_fraction: 0.4,
            smart_max_height_fraction: 0.7,
        }
    }
}

impl CardCropConfig {
    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a stage meaningless.
    pub fn validate(&self) -> Result<()> {
        let d = &self.detection;
        let c = &self.crop;

        check(self.card_aspect.is_finite() && self.card_aspect > 0.0, "card_aspect must be positive")?;
        check(d.max_dimension > 0, "detection.max_dimension must be positive")?;
        check(
            d.min_window_px > 0.0 && d.min_window_px <= d.max_window_px,
            "detection.min_window_px must be positive and <= max_window_px",
        )?;
        check(
            !d.window_scales.is_empty() && d.window_scales.iter().all(|s| s.is_finite() && *s > 0.0),
            "detection.window_scales must be non-empty and positive",
        )?;
        check(d.min_step > 0, "detection.min_step must be positive")?;
        check(d.step_divisor > 0, "detection.step_divisor must be positive")?;
        check(d.border_sample_stride > 0, "detection.border_sample_stride must be positive")?;
        check(
            (0.0..=1.0).contains(&d.iou_threshold),
            "detection.iou_threshold must be within [0, 1]",
        )?;
        check(
            d.min_aspect > 0.0 && d.min_aspect <= d.max_aspect,
            "detection.min_aspect must be positive and <= max_aspect",
        )?;
        check(c.output_width > 0 && c.output_height > 0, "crop output size must be positive")?;
        check(
            c.smart_width_fraction > 0.0 && c.smart_width_fraction <= 1.0,
            "crop.smart_width_fraction must be within (0, 1]",
        )?;
        check(
            c.smart_max_height_fraction > 0.0 && c.smart_max_height_fraction <= 1.0,
            "crop.smart_max_height_fraction must be within (0, 1]",
        )?;
        if let OutputFormat::Jpeg { quality } = c.format {
            check((1..=100).contains(&quality), "crop.format.quality must be within 1..=100")?;
        }
        Ok(())
    }
}

fn check(ok: bool, message: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(CardCropError::InvalidConfig(message.to_owned()))
    }
}
