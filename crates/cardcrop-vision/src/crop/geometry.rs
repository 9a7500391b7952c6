// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Crop geometry — smart default bounds and aspect-locked adjustment.

use cardcrop_core::{CardCropConfig, CropBounds, Rectangle};
use tracing::debug;

/// Centered card-shaped box derived only from the image dimensions.
///
/// Starts at `smart_width_fraction` of the image width; when the implied
/// height would exceed `smart_max_height_fraction` of the image height the
/// height is capped and the width re-derived.
pub fn compute_smart_bounds(image_w: u32, image_h: u32, config: &CardCropConfig) -> CropBounds {
    let aspect = config.card_aspect;
    let (img_w, img_h) = (image_w as f64, image_h as f64);

    let mut width = img_w * config.crop.smart_width_fraction;
    let mut height = width / aspect;
    let max_height = img_h * config.crop.smart_max_height_fraction;
    if height > max_height {
        height = max_height;
        width = height * aspect;
    }

    CropBounds::new((img_w - width) / 2.0, (img_h - height) / 2.0, width, height)
}

/// Force `bounds` to `target_aspect` and fit it inside the image.
///
/// Too-wide boxes lose width and too-tall boxes lose height, re-centred
/// within the original box. Only then is the result fitted to the image:
/// oversized boxes shrink uniformly and the origin is clamped. Degenerate
/// input falls back to the smart bounds.
pub fn adjust_to_aspect(
    bounds: CropBounds,
    image_w: u32,
    image_h: u32,
    target_aspect: f64,
    config: &CardCropConfig,
) -> CropBounds {
    if !bounds.is_valid() || !(target_aspect.is_finite() && target_aspect > 0.0) {
        debug!(?bounds, target_aspect, "Degenerate crop bounds; using smart bounds");
        return compute_smart_bounds(image_w, image_h, config);
    }

    let CropBounds {
        mut x,
        mut y,
        mut width,
        mut height,
    } = bounds;

    // Step 1: resize to the target aspect within the original box.
    let current = width / height;
    if current > target_aspect {
        let new_width = height * target_aspect;
        x += (width - new_width) / 2.0;
        width = new_width;
    } else if current < target_aspect {
        let new_height = width / target_aspect;
        y += (height - new_height) / 2.0;
        height = new_height;
    }

    // Step 2: fit to the image without disturbing the aspect ratio.
    let (img_w, img_h) = (image_w as f64, image_h as f64);
    let shrink = (img_w / width).min(img_h / height).min(1.0);
    if shrink < 1.0 {
        let (cx, cy) = (x + width / 2.0, y + height / 2.0);
        width *= shrink;
        height *= shrink;
        x = cx - width / 2.0;
        y = cy - height / 2.0;
    }
    x = x.clamp(0.0, (img_w - width).max(0.0));
    y = y.clamp(0.0, (img_h - height).max(0.0));

    CropBounds::new(x, y, width, height)
}

/// Crop window covering a detected rectangle.
pub fn bounds_from_rectangle(rect: &Rectangle) -> CropBounds {
    CropBounds::from(rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn smart_bounds_square_image() {
        let config = CardCropConfig::default();
        let b = compute_smart_bounds(1000, 1000, &config);
        assert!(close(b.x, 300.0), "{b:?}");
        assert!(close(b.y, 220.0), "{b:?}");
        assert!(close(b.width, 400.0), "{b:?}");
        assert!(close(b.height, 560.0), "{b:?}");
    }

    #[test]
    fn smart_bounds_wide_image_caps_height() {
        let config = CardCropConfig::default();
        // 40% of 2000 = 800 wide would need 1120 tall; cap at 70% of 500.
        let b = compute_smart_bounds(2000, 500, &config);
        assert!(close(b.height, 350.0));
        assert!(close(b.width, 250.0));
        assert!(close(b.x, 875.0));
        assert!(close(b.y, 75.0));
        assert!(b.fits_within(2000, 500));
    }

    #[test]
    fn adjust_shrinks_wide_box_horizontally() {
        let config = CardCropConfig::default();
        let aspect = config.card_aspect;
        let b = adjust_to_aspect(CropBounds::new(100.0, 100.0, 300.0, 140.0), 1000, 1000, aspect, &config);
        assert!(close(b.height, 140.0));
        assert!(close(b.width, 100.0));
        assert!(close(b.x, 200.0));
        assert!(close(b.y, 100.0));
        assert!((b.aspect_ratio() - aspect).abs() < 1e-3);
    }

    #[test]
    fn adjust_shrinks_tall_box_vertically() {
        let config = CardCropConfig::default();
        let aspect = config.card_aspect;
        let b = adjust_to_aspect(CropBounds::new(0.0, 0.0, 100.0, 400.0), 1000, 1000, aspect, &config);
        assert!(close(b.width, 100.0));
        assert!(close(b.height, 140.0));
        assert!(close(b.y, 130.0));
    }

    #[test]
    fn adjust_clamps_into_image_after_resizing() {
        let config = CardCropConfig::default();
        let aspect = config.card_aspect;
        let b = adjust_to_aspect(CropBounds::new(-50.0, 900.0, 200.0, 280.0), 1000, 1000, aspect, &config);
        assert!(close(b.x, 0.0));
        assert!(close(b.y, 720.0));
        assert!(b.fits_within(1000, 1000));
        assert!((b.aspect_ratio() - aspect).abs() < 1e-3);
    }

    #[test]
    fn adjust_oversized_box_keeps_aspect() {
        let config = CardCropConfig::default();
        let aspect = config.card_aspect;
        let b = adjust_to_aspect(CropBounds::new(0.0, 0.0, 1000.0, 1400.0), 300, 200, aspect, &config);
        assert!(b.fits_within(300, 200), "{b:?}");
        assert!((b.aspect_ratio() - aspect).abs() < 1e-3);
        assert!(close(b.height, 200.0));
    }

    #[test]
    fn adjust_holds_aspect_lock_over_many_inputs() {
        let config = CardCropConfig::default();
        for &(iw, ih) in &[(1000u32, 1000u32), (640, 480), (120, 900), (37, 53)] {
            for &(x, y, w, h) in &[
                (0.0, 0.0, 10.0, 10.0),
                (5.0, 7.0, 300.0, 20.0),
                (-20.0, -20.0, 5000.0, 50.0),
                (30.0, 400.0, 12.5, 900.0),
            ] {
                for &target in &[config.card_aspect, 1.0, 1.6] {
                    let b = adjust_to_aspect(CropBounds::new(x, y, w, h), iw, ih, target, &config);
                    assert!((b.aspect_ratio() - target).abs() < 1e-3, "{b:?} target {target}");
                    assert!(b.fits_within(iw, ih), "{b:?} in {iw}x{ih}");
                    assert!(b.x >= -EPS && b.y >= -EPS);
                }
            }
        }
    }

    #[test]
    fn degenerate_bounds_use_smart_default() {
        let config = CardCropConfig::default();
        let b = adjust_to_aspect(CropBounds::new(10.0, 10.0, 0.0, 50.0), 1000, 1000, config.card_aspect, &config);
        assert_eq!(b, compute_smart_bounds(1000, 1000, &config));
    }
}
