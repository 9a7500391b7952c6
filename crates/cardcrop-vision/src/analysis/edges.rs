// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Binary edge map from forward-difference luminance gradients.

use image::{GrayImage, Luma, RgbaImage};
use tracing::{debug, instrument};

pub const EDGE: u8 = 255;
pub const NON_EDGE: u8 = 0;

/// Binary (0/255) edge buffer aligned with the analysis image.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeMap {
    pixels: GrayImage,
}

impl EdgeMap {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Out-of-range coordinates are never edges.
    #[inline]
    pub fn is_edge(&self, x: u32, y: u32) -> bool {
        x < self.width() && y < self.height() && self.pixels.get_pixel(x, y).0[0] == EDGE
    }

    pub fn edge_count(&self) -> usize {
        self.pixels.pixels().filter(|p| p.0[0] == EDGE).count()
    }

    /// Fraction of all pixels marked as edges.
    pub fn density(&self) -> f64 {
        let total = self.width() as u64 * self.height() as u64;
        if total == 0 {
            0.0
        } else {
            self.edge_count() as f64 / total as f64
        }
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn into_image(self) -> GrayImage {
        self.pixels
    }
}

/// Mark interior pixels whose gradient `|dI/dx| + |dI/dy|` exceeds `threshold`.
///
/// Reads the first channel of a luminance image. The one-pixel frame is
/// always non-edge.
#[instrument(skip(gray), fields(width = gray.width(), height = gray.height()))]
pub fn detect_edges(gray: &RgbaImage, threshold: u32) -> EdgeMap {
    let (width, height) = gray.dimensions();
    let mut pixels = GrayImage::from_pixel(width, height, Luma([NON_EDGE]));

    if width >= 3 && height >= 3 {
        let intensity = |x: u32, y: u32| -> i32 { gray.get_pixel(x, y).0[0] as i32 };
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let here = intensity(x, y);
                let gx = (intensity(x + 1, y) - here).unsigned_abs();
                let gy = (intensity(x, y + 1) - here).unsigned_abs();
                if gx + gy > threshold {
                    pixels.put_pixel(x, y, Luma([EDGE]));
                }
            }
        }
    }

    let map = EdgeMap { pixels };
    debug!(edges = map.edge_count(), "Edge map built");
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gray(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let v = f(x, y);
            Rgba([v, v, v, 255])
        })
    }

    #[test]
    fn uniform_image_has_no_edges() {
        let map = detect_edges(&gray(50, 40, |_, _| 128), 30);
        assert_eq!(map.edge_count(), 0);
        assert_eq!((map.width(), map.height()), (50, 40));
    }

    #[test]
    fn vertical_step_marks_column_before_step() {
        // Dark left half, bright right half starting at x = 10.
        let map = detect_edges(&gray(20, 20, |x, _| if x >= 10 { 200 } else { 20 }), 30);
        for y in 1..19 {
            assert!(map.is_edge(9, y), "expected edge at (9, {y})");
            assert!(!map.is_edge(10, y));
        }
        assert_eq!(map.edge_count(), 18);
    }

    #[test]
    fn border_is_never_an_edge() {
        let map = detect_edges(&gray(10, 10, |x, y| ((x + y) % 2 * 255) as u8), 30);
        for i in 0..10 {
            assert!(!map.is_edge(i, 0));
            assert!(!map.is_edge(i, 9));
            assert!(!map.is_edge(0, i));
            assert!(!map.is_edge(9, i));
        }
        assert!(map.is_edge(1, 1));
    }

    #[test]
    fn threshold_is_strict() {
        // Gradient of exactly 30 is not an edge; 31 is.
        let at = detect_edges(&gray(5, 5, |x, _| if x >= 3 { 30 } else { 0 }), 30);
        assert_eq!(at.edge_count(), 0);
        let above = detect_edges(&gray(5, 5, |x, _| if x >= 3 { 31 } else { 0 }), 30);
        assert_eq!(above.edge_count(), 3);
    }

    #[test]
    fn tiny_images_produce_empty_maps() {
        let map = detect_edges(&gray(2, 2, |x, _| (x * 255) as u8), 30);
        assert_eq!(map.edge_count(), 0);
        assert_eq!(map.density(), 0.0);
    }
}
