// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cardcrop-vision — trading card detection and cropping.
//
// Finds card-shaped rectangles in a photo with a bounded sliding-window search
// over a gradient edge map, then crops a chosen region to a fixed card canvas
// while holding the card aspect ratio.

pub mod analysis;
pub mod crop;
pub mod detector;
pub mod image;
pub mod session;

// Re-export the primary structs so callers can use `cardcrop_vision::CardDetector` etc.
pub use crop::{CropOutput, Cropper};
pub use detector::CardDetector;
pub use crate::image::processor::ImageProcessor;
pub use session::{BatchInput, BatchIssue, BatchSummary, DetectionSession, SessionCard};
