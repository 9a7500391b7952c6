// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Candidate ranking — greedy non-max suppression, plausibility filters, and
// a confidence-ordered, capped result list.

use cardcrop_core::{DetectionConfig, Rectangle};
use imageproc::rect::Rect;
use tracing::{debug, instrument};

/// Intersection-over-Union of two rectangles, in `[0, 1]`.
pub fn iou(a: &Rectangle, b: &Rectangle) -> f64 {
    let intersection = to_rect(a)
        .intersect(to_rect(b))
        .map(|r| r.width() as u64 * r.height() as u64)
        .unwrap_or(0);
    let union = a.area() + b.area() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn to_rect(r: &Rectangle) -> Rect {
    Rect::at(r.x as i32, r.y as i32).of_size(r.width.max(1), r.height.max(1))
}

/// Greedy non-max suppression.
///
/// Candidates are visited from highest to lowest confidence; a candidate is
/// kept unless it overlaps an already kept one by more than `iou_threshold`.
/// The sort is stable, so among equal confidences the first-seen candidate
/// wins.
pub fn suppress_overlaps(candidates: Vec<Rectangle>, iou_threshold: f64) -> Vec<Rectangle> {
    let mut ordered = candidates;
    ordered.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Rectangle> = Vec::with_capacity(ordered.len());
    for candidate in ordered {
        if kept.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

/// Whether a rectangle is plausibly a card in a `image_w` x `image_h` image.
pub fn is_plausible(rect: &Rectangle, image_w: u32, image_h: u32, config: &DetectionConfig) -> bool {
    let min_side = image_w.min(image_h) as f64;
    let max_side = image_w.max(image_h) as f64;
    let width = rect.width as f64;
    let height = rect.height as f64;

    let too_small = width < config.min_size_fraction * min_side;
    let too_large = width > config.max_size_fraction * max_side
        || height > config.max_size_fraction * max_side;
    let aspect = width / height.max(1.0);
    let odd_shape = aspect < config.min_aspect || aspect > config.max_aspect;

    !(too_small || too_large || odd_shape)
}

/// Deduplicate, filter, sort and cap raw search candidates.
#[instrument(skip(candidates, config), fields(input = candidates.len()))]
pub fn filter_and_rank(
    candidates: Vec<Rectangle>,
    image_w: u32,
    image_h: u32,
    config: &DetectionConfig,
) -> Vec<Rectangle> {
    let deduped = suppress_overlaps(candidates, config.iou_threshold);
    let after_nms = deduped.len();

    let mut ranked: Vec<Rectangle> = deduped
        .into_iter()
        .filter(|r| is_plausible(r, image_w, image_h, config))
        .collect();

    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    ranked.truncate(config.max_results);

    debug!(after_nms, kept = ranked.len(), "Candidates ranked");
    ranked
}
