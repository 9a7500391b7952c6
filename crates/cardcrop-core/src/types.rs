// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for card detection and cropping.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a batch detection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Integer pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// An axis-aligned card candidate.
///
/// `corners` and `aspect_ratio` are always derived from the position and
/// size; construct through [`Rectangle::new`] to keep them in sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Detection score in `[0, 1]`.
    pub confidence: f64,
    /// `[top_left, top_right, bottom_right, bottom_left]`.
    pub corners: [Point; 4],
    /// `width / height`.
    pub aspect_ratio: f64,
}

impl Rectangle {
    /// Build a rectangle, deriving corners and aspect ratio.
    ///
    /// Zero sizes are bumped to one pixel; confidence is clamped to `[0, 1]`.
    pub fn new(x: u32, y: u32, width: u32, height: u32, confidence: f64) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let right = x.saturating_add(width);
        let bottom = y.saturating_add(height);
        Self {
            x,
            y,
            width,
            height,
            confidence: if confidence.is_finite() {
                confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
            corners: [
                Point { x, y },
                Point { x: right, y },
                Point { x: right, y: bottom },
                Point { x, y: bottom },
            ],
            aspect_ratio: width as f64 / height as f64,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether the rectangle lies fully inside a `image_w` x `image_h` image.
    pub fn fits_within(&self, image_w: u32, image_h: u32) -> bool {
        self.right() <= image_w && self.bottom() <= image_h
    }

    /// Map the rectangle through per-axis scale factors and clamp it into a
    /// `image_w` x `image_h` image.
    pub fn rescale(&self, scale_x: f64, scale_y: f64, image_w: u32, image_h: u32) -> Self {
        let max_x = image_w.saturating_sub(1);
        let max_y = image_h.saturating_sub(1);
        let x = ((self.x as f64 * scale_x).floor() as u32).min(max_x);
        let y = ((self.y as f64 * scale_y).floor() as u32).min(max_y);
        let width = ((self.width as f64 * scale_x).round() as u32)
            .clamp(1, image_w.saturating_sub(x).max(1));
        let height = ((self.height as f64 * scale_y).round() as u32)
            .clamp(1, image_h.saturating_sub(y).max(1));
        Self::new(x, y, width, height, self.confidence)
    }
}

/// Crop window in original-image pixel coordinates.
///
/// Kept in floating point so that aspect locking survives without integer
/// rounding; rendering rounds to whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropBounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// `width / height`, or 0 for a degenerate box.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            0.0
        }
    }

    /// True when the box has a finite, positive area.
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }

    /// Whether the box lies inside `[0, image_w] x [0, image_h]`, allowing
    /// for floating point slack.
    pub fn fits_within(&self, image_w: u32, image_h: u32) -> bool {
        const EPS: f64 = 1e-6;
        self.x >= -EPS
            && self.y >= -EPS
            && self.x + self.width <= image_w as f64 + EPS
            && self.y + self.height <= image_h as f64 + EPS
    }
}

impl From<&Rectangle> for CropBounds {
    fn from(rect: &Rectangle) -> Self {
        Self::new(
            rect.x as f64,
            rect.y as f64,
            rect.width as f64,
            rect.height as f64,
        )
    }
}

/// Raster format for encoded crops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OutputFormat {
    /// JPEG with quality 1-100.
    Jpeg { quality: u8 },
    Png,
}

impl OutputFormat {
    /// JPEG quality used when none is configured.
    pub const DEFAULT_JPEG_QUALITY: u8 = 92;

    /// JPEG quality of this format, if it is JPEG.
    pub fn jpeg_quality(&self) -> Option<u8> {
        match self {
            Self::Jpeg { quality } => Some(*quality),
            Self::Png => None,
        }
    }

    /// MIME type string for the encoded bytes.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Conventional file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "jpg",
            Self::Png => "png",
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Jpeg {
            quality: Self::DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Ranked detection output for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Candidates in original-image coordinates, confidence-descending.
    pub rectangles: Vec<Rectangle>,
    /// Human-readable description of each stage, for diagnostics only.
    pub debug_steps: Vec<String>,
    pub image_width: u32,
    pub image_height: u32,
    /// Dimensions of the downscaled analysis image.
    pub analysis_width: u32,
    pub analysis_height: u32,
    /// Number of search windows scored.
    pub windows_evaluated: usize,
}

impl DetectionResult {
    /// The highest-confidence candidate, if any.
    pub fn best(&self) -> Option<&Rectangle> {
        self.rectangles.first()
    }

    pub fn is_empty(&self) -> bool {
        self.rectangles.is_empty()
    }
}

/// How the crop window for a card was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoundsSource {
    /// Taken from the best detector candidate.
    Detected { confidence: f64 },
    /// Derived analytically from the image dimensions.
    Smart,
    /// Supplied by the caller.
    Manual,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_derives_corners_and_aspect() {
        let rect = Rectangle::new(10, 20, 50, 70, 0.8);
        assert_eq!(rect.corners[0], Point { x: 10, y: 20 });
        assert_eq!(rect.corners[1], Point { x: 60, y: 20 });
        assert_eq!(rect.corners[2], Point { x: 60, y: 90 });
        assert_eq!(rect.corners[3], Point { x: 10, y: 90 });
        assert!((rect.aspect_ratio - 50.0 / 70.0).abs() < 1e-12);
        assert!(rect.fits_within(60, 90));
        assert!(!rect.fits_within(59, 90));
    }

    #[test]
    fn rectangle_clamps_confidence() {
        assert_eq!(Rectangle::new(0, 0, 1, 1, 1.7).confidence, 1.0);
        assert_eq!(Rectangle::new(0, 0, 1, 1, -0.2).confidence, 0.0);
        assert_eq!(Rectangle::new(0, 0, 1, 1, f64::NAN).confidence, 0.0);
    }

    #[test]
    fn rescale_stays_in_bounds() {
        // Analysis image 800x200 mapped back onto 2000x500.
        let rect = Rectangle::new(750, 130, 50, 70, 0.9);
        let mapped = rect.rescale(2.5, 2.5, 2000, 500);
        assert_eq!(mapped.x, 1875);
        assert_eq!(mapped.y, 325);
        assert!(mapped.fits_within(2000, 500));
        assert_eq!(mapped.confidence, 0.9);
    }

    #[test]
    fn crop_bounds_validity() {
        assert!(CropBounds::new(0.0, 0.0, 10.0, 14.0).is_valid());
        assert!(!CropBounds::new(0.0, 0.0, 0.0, 14.0).is_valid());
        assert!(!CropBounds::new(f64::NAN, 0.0, 10.0, 14.0).is_valid());
    }

    #[test]
    fn output_format_serde_shape() {
        let json = serde_json::to_string(&OutputFormat::Jpeg { quality: 90 }).expect("serialize");
        assert_eq!(json, r#"{"kind":"jpeg","quality":90}"#);
        let png: OutputFormat = serde_json::from_str(r#"{"kind":"png"}"#).expect("deserialize");
        assert_eq!(png, OutputFormat::Png);
        assert_eq!(png.extension(), "png");
        assert_eq!(png.jpeg_quality(), None);
        assert_eq!(OutputFormat::default().jpeg_quality(), Some(OutputFormat::DEFAULT_JPEG_QUALITY));
    }
}
