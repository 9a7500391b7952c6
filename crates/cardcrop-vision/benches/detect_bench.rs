// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the cardcrop-vision crate: full detection on a
// photo-sized synthetic image and a single aspect-locked crop.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, Rgba, RgbaImage};

use cardcrop_core::{CardCropConfig, CropBounds, OutputFormat};
use cardcrop_vision::{CardDetector, Cropper, ImageProcessor};

/// Dark 1600x1200 background with a bright card-shaped block.
fn synthetic_photo() -> DynamicImage {
    let mut img = RgbaImage::from_pixel(1600, 1200, Rgba([25, 30, 35, 255]));
    for y in 100..660 {
        for x in 200..600 {
            img.put_pixel(x, y, Rgba([235, 230, 220, 255]));
        }
    }
    DynamicImage::ImageRgba8(img)
}

/// Detection includes the downscale to 800px, so the input size matters
/// more than the card placement.
fn bench_detect(c: &mut Criterion) {
    let photo = synthetic_photo();
    let detector = CardDetector::new(CardCropConfig::default());

    c.bench_function("detect_image (1600x1200)", |b| {
        b.iter(|| {
            let result = detector.detect_image(black_box(&photo));
            black_box(result.ok());
        });
    });
}

fn bench_crop(c: &mut Criterion) {
    let bytes = ImageProcessor::from_dynamic(synthetic_photo())
        .to_png_bytes()
        .unwrap_or_default();
    let cropper = Cropper::new(CardCropConfig::default());
    let bounds = CropBounds::new(200.0, 100.0, 400.0, 560.0);

    c.bench_function("crop to 300x420 jpeg (1600x1200 png)", |b| {
        b.iter(|| {
            let out = cropper.crop(
                black_box(&bytes),
                bounds,
                300,
                420,
                OutputFormat::default(),
            );
            black_box(out.ok());
        });
    });
}

criterion_group!(benches, bench_detect, bench_crop);
criterion_main!(benches);
