// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded multi-size sliding-window search for card-shaped edge outlines.
//
// Only three window sizes are tried and the total number of scored windows
// is capped, so the cost of a search is constant regardless of image content.

use cardcrop_core::{DetectionConfig, Rectangle};
use tracing::{debug, instrument};

use super::edges::EdgeMap;

/// A window position and size in analysis-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Candidates produced by one search, unranked and unfiltered.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub candidates: Vec<Rectangle>,
    /// Number of windows scored (never above the configured cap).
    pub evaluations: usize,
}

/// Sliding-window searcher bound to one configuration.
pub struct RectangleSearcher<'a> {
    config: &'a DetectionConfig,
    card_aspect: f64,
}

impl<'a> RectangleSearcher<'a> {
    pub fn new(config: &'a DetectionConfig, card_aspect: f64) -> Self {
        Self {
            config,
            card_aspect,
        }
    }

    /// Smallest window `(width, height)` for an image `image_w` pixels wide.
    ///
    /// The pixel limits are applied lower bound first, so a configuration
    /// with `min_window_px > max_window_px` resolves to `max_window_px`.
    pub fn base_window(&self, image_w: u32) -> (f64, f64) {
        let min_w = (image_w as f64 * self.config.min_window_fraction)
            .max(self.config.min_window_px)
            .min(self.config.max_window_px);
        (min_w, min_w / self.card_aspect)
    }

    /// Window sizes in pixels, smallest first.
    pub fn window_sizes(&self, image_w: u32) -> Vec<(u32, u32)> {
        let (min_w, min_h) = self.base_window(image_w);
        self.config
            .window_scales
            .iter()
            .map(|scale| {
                (
                    ((min_w * scale).round() as u32).max(1),
                    ((min_h * scale).round() as u32).max(1),
                )
            })
            .collect()
    }

    /// Sliding stride for an `image_w` x `image_h` image.
    pub fn step(&self, image_w: u32, image_h: u32) -> u32 {
        let divisor = self.config.step_divisor.max(1);
        self.config
            .min_step
            .max(image_w.min(image_h) / divisor)
            .max(1)
    }

    /// Scan the edge map and return every window scoring above the
    /// confidence threshold.
    #[instrument(skip(self, edges))]
    pub fn search(&self, edges: &EdgeMap, image_w: u32, image_h: u32) -> SearchOutcome {
        let image_w = image_w.min(edges.width());
        let image_h = image_h.min(edges.height());
        let step = self.step(image_w, image_h) as usize;
        let cap = self.config.max_window_evaluations;

        let mut outcome = SearchOutcome::default();

        'sizes: for (width, height) in self.window_sizes(image_w) {
            if width > image_w || height > image_h {
                debug!(width, height, "Window larger than image; skipping size");
                continue;
            }
            for y in (0..=image_h - height).step_by(step) {
                for x in (0..=image_w - width).step_by(step) {
                    if outcome.evaluations >= cap {
                        break 'sizes;
                    }
                    outcome.evaluations += 1;

                    let window = Window {
                        x,
                        y,
                        width,
                        height,
                    };
                    let confidence = self.evaluate(edges, window);
                    if confidence > self.config.min_confidence {
                        outcome
                            .candidates
                            .push(Rectangle::new(x, y, width, height, confidence));
                    }
                }
            }
        }

        debug!(
            evaluations = outcome.evaluations,
            candidates = outcome.candidates.len(),
            step,
            "Window search complete"
        );
        outcome
    }

    /// Score a window from edge hits along its four border lines plus a
    /// bonus for matching the card aspect ratio.
    pub fn evaluate(&self, edges: &EdgeMap, window: Window) -> f64 {
        let edge_ratio = border_edge_ratio(edges, window, self.config.border_sample_stride);

        let window_aspect = window.width as f64 / window.height.max(1) as f64;
        let aspect_bonus =
            (1.0 - (window_aspect - self.card_aspect).abs() / self.card_aspect).max(0.0);

        edge_ratio * self.config.edge_weight + aspect_bonus * self.config.aspect_weight
    }
}

/// Fraction of sampled border pixels that are edges.
///
/// Samples the top and bottom rows and the left and right columns of the
/// window every `stride` pixels. The interior is never read.
pub fn border_edge_ratio(edges: &EdgeMap, window: Window, stride: u32) -> f64 {
    let Window {
        x,
        y,
        width,
        height,
    } = window;
    if width == 0 || height == 0 {
        return 0.0;
    }
    let stride = stride.max(1) as usize;
    let right = x + width - 1;
    let bottom = y + height - 1;

    let mut samples = 0usize;
    let mut hits = 0usize;
    let mut sample = |px: u32, py: u32| {
        samples += 1;
        if edges.is_edge(px, py) {
            hits += 1;
        }
    };

    for dx in (0..width).step_by(stride) {
        sample(x + dx, y);
        sample(x + dx, bottom);
    }
    for dy in (0..height).step_by(stride) {
        sample(x, y + dy);
        sample(right, y + dy);
    }

    if samples == 0 {
        0.0
    } else {
        hits as f64 / samples as f64
    }
}
