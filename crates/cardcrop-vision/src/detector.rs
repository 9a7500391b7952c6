// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Card detector — runs preprocess → edges → search → rank and maps the
// ranked candidates back to source-image coordinates.
//
// ## Pipeline
//
// 1. Downscale to at most `max_dimension` and convert to luminance
// 2. Build the binary edge map
// 3. Score at most `max_window_evaluations` card-shaped windows
// 4. Suppress overlaps, filter implausible shapes, sort and cap
// 5. Rescale survivors to the original image
//
// The async entry points run the same stages but yield to the runtime
// between them, and an optional deadline is checked before every stage.

use std::time::Instant;

use cardcrop_core::error::{CardCropError, Result};
use cardcrop_core::{CardCropConfig, DetectionResult, Rectangle};
use image::{DynamicImage, RgbaImage};
use tracing::{debug, info, instrument};

use crate::analysis::{self, EdgeMap, RectangleSearcher, SearchOutcome};
use crate::image::processor;

/// Detects card-shaped rectangles in photos.
#[derive(Debug, Clone, Default)]
pub struct CardDetector {
    config: CardCropConfig,
    deadline: Option<Instant>,
}

impl CardDetector {
    pub fn new(config: CardCropConfig) -> Self {
        Self {
            config,
            deadline: None,
        }
    }

    /// Abort detection with `DeadlineExceeded` once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn config(&self) -> &CardCropConfig {
        &self.config
    }

    // -- Synchronous ----------------------------------------------------------

    /// Decode `data` and detect card candidates.
    ///
    /// Fails with `Decode` for unreadable input. An image without any
    /// plausible card yields an empty candidate list, not an error.
    #[instrument(skip(self, data), fields(data_len = data.len()))]
    pub fn detect(&self, data: &[u8]) -> Result<DetectionResult> {
        self.checkpoint("decode")?;
        let image = processor::decode(data)?;
        self.detect_image(&image)
    }

    /// Detect card candidates in an already decoded image.
    pub fn detect_image(&self, image: &DynamicImage) -> Result<DetectionResult> {
        let mut run = Run::new(&self.config, image);

        self.checkpoint("preprocess")?;
        let gray = run.prepare(image);
        self.checkpoint("edges")?;
        let edges = run.edges(&gray);
        self.checkpoint("search")?;
        let outcome = run.search(&edges);
        self.checkpoint("rank")?;
        let ranked = run.rank(outcome.candidates, edges.width(), edges.height());

        Ok(run.finish(ranked, edges.width(), edges.height(), outcome.evaluations))
    }

    // -- Cooperative async ----------------------------------------------------

    /// Async variant of [`CardDetector::detect`] that yields between stages.
    pub async fn detect_async(&self, data: &[u8]) -> Result<DetectionResult> {
        self.checkpoint("decode")?;
        let image = processor::decode(data)?;
        tokio::task::yield_now().await;
        self.detect_image_async(&image).await
    }

    /// Async variant of [`CardDetector::detect_image`].
    pub async fn detect_image_async(&self, image: &DynamicImage) -> Result<DetectionResult> {
        let mut run = Run::new(&self.config, image);

        self.checkpoint("preprocess")?;
        let gray = run.prepare(image);
        tokio::task::yield_now().await;

        self.checkpoint("edges")?;
        let edges = run.edges(&gray);
        drop(gray);
        tokio::task::yield_now().await;

        self.checkpoint("search")?;
        let outcome = run.search(&edges);
        tokio::task::yield_now().await;

        self.checkpoint("rank")?;
        let ranked = run.rank(outcome.candidates, edges.width(), edges.height());

        Ok(run.finish(ranked, edges.width(), edges.height(), outcome.evaluations))
    }

    // -- Diagnostics ----------------------------------------------------------

    /// Edge map of the analysis image, for diagnostic export.
    pub fn edge_map(&self, image: &DynamicImage) -> EdgeMap {
        let gray = analysis::prepare(image, self.config.detection.max_dimension);
        analysis::detect_edges(&gray, self.config.detection.gradient_threshold)
    }

    fn checkpoint(&self, stage: &'static str) -> Result<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                debug!(stage, "Detection deadline exceeded");
                Err(CardCropError::DeadlineExceeded { stage })
            }
            _ => Ok(()),
        }
    }
}

/// State carried through one detection call.
struct Run<'a> {
    config: &'a CardCropConfig,
    image_w: u32,
    image_h: u32,
    steps: Vec<String>,
}

impl<'a> Run<'a> {
    fn new(config: &'a CardCropConfig, image: &DynamicImage) -> Self {
        Self {
            config,
            image_w: image.width(),
            image_h: image.height(),
            steps: Vec::new(),
        }
    }

    fn prepare(&mut self, image: &DynamicImage) -> RgbaImage {
        let gray = analysis::prepare(image, self.config.detection.max_dimension);
        let (w, h) = gray.dimensions();
        if (w, h) == (self.image_w, self.image_h) {
            self.steps
                .push(format!("preprocess: {w}x{h} converted to luminance"));
        } else {
            self.steps.push(format!(
                "preprocess: downscaled {}x{} to {w}x{h} and converted to luminance",
                self.image_w, self.image_h
            ));
        }
        gray
    }

    fn edges(&mut self, gray: &RgbaImage) -> EdgeMap {
        let threshold = self.config.detection.gradient_threshold;
        let edges = analysis::detect_edges(gray, threshold);
        self.steps.push(format!(
            "edges: {} edge pixels ({:.2}%) at gradient threshold {threshold}",
            edges.edge_count(),
            edges.density() * 100.0
        ));
        edges
    }

    fn search(&mut self, edges: &EdgeMap) -> SearchOutcome {
        let searcher = RectangleSearcher::new(&self.config.detection, self.config.card_aspect);
        let outcome = searcher.search(edges, edges.width(), edges.height());
        self.steps.push(format!(
            "search: scored {} windows (cap {}), {} above confidence {}",
            outcome.evaluations,
            self.config.detection.max_window_evaluations,
            outcome.candidates.len(),
            self.config.detection.min_confidence
        ));
        outcome
    }

    fn rank(&mut self, candidates: Vec<Rectangle>, analysis_w: u32, analysis_h: u32) -> Vec<Rectangle> {
        let before = candidates.len();
        let ranked = analysis::filter_and_rank(candidates, analysis_w, analysis_h, &self.config.detection);
        self.steps.push(format!(
            "rank: {} of {before} candidates kept after overlap suppression and filtering",
            ranked.len()
        ));
        ranked
    }

    fn finish(
        mut self,
        ranked: Vec<Rectangle>,
        analysis_w: u32,
        analysis_h: u32,
        windows_evaluated: usize,
    ) -> DetectionResult {
        // Overlap suppression ran in analysis space. With an integer scale
        // the mapping is exact; otherwise per-axis rounding can move IoU by
        // up to one source pixel per side.
        let scale_x = self.image_w as f64 / analysis_w.max(1) as f64;
        let scale_y = self.image_h as f64 / analysis_h.max(1) as f64;
        let rectangles: Vec<Rectangle> = ranked
            .iter()
            .map(|r| r.rescale(scale_x, scale_y, self.image_w, self.image_h))
            .collect();

        if let Some(best) = rectangles.first() {
            self.steps.push(format!(
                "result: best {}x{} at ({}, {}) confidence {:.3}",
                best.width, best.height, best.x, best.y, best.confidence
            ));
        } else {
            self.steps
                .push("result: no card found; callers should use smart bounds".to_owned());
        }

        info!(
            width = self.image_w,
            height = self.image_h,
            candidates = rectangles.len(),
            windows_evaluated,
            "Card detection complete"
        );

        DetectionResult {
            rectangles,
            debug_steps: self.steps,
            image_width: self.image_w,
            image_height: self.image_h,
            analysis_width: analysis_w,
            analysis_height: analysis_h,
            windows_evaluated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::iou;
    use crate::crop::compute_smart_bounds;
    use crate::image::processor::ImageProcessor;
    use image::{GrayImage, Luma, Rgba};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn png(image: DynamicImage) -> Vec<u8> {
        ImageProcessor::from_dynamic(image).to_png_bytes().expect("encode fixture")
    }

    /// Dark 400x400 photo with a bright card whose outline lands on the
    /// 50x70 search window at (40, 20).
    fn card_photo() -> DynamicImage {
        let mut img = image::RgbaImage::from_pixel(400, 400, Rgba([25, 30, 35, 255]));
        draw_filled_rect_mut(&mut img, Rect::at(41, 21).of_size(49, 69), Rgba([235, 230, 220, 255]));
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn uniform_image_has_no_rectangles() {
        let detector = CardDetector::default();
        let bytes = png(DynamicImage::ImageLuma8(GrayImage::from_pixel(1000, 1000, Luma([128]))));
        let result = detector.detect(&bytes).expect("detect");

        assert!(result.rectangles.is_empty());
        assert_eq!((result.analysis_width, result.analysis_height), (800, 800));
        assert!(result.windows_evaluated <= 100);
        assert!(!result.debug_steps.is_empty());

        let smart = compute_smart_bounds(result.image_width, result.image_height, detector.config());
        assert!((smart.x - 300.0).abs() < 1e-6);
        assert!((smart.y - 220.0).abs() < 1e-6);
        assert!((smart.width - 400.0).abs() < 1e-6);
        assert!((smart.height - 560.0).abs() < 1e-6);
    }

    #[test]
    fn wide_image_is_analysed_at_800x200() {
        let detector = CardDetector::default();
        let bytes = png(DynamicImage::ImageLuma8(GrayImage::from_pixel(2000, 500, Luma([90]))));
        let result = detector.detect(&bytes).expect("detect");
        assert_eq!((result.analysis_width, result.analysis_height), (800, 200));
        assert_eq!((result.image_width, result.image_height), (2000, 500));
        assert!(result.debug_steps[0].contains("2000x500 to 800x200"));
    }

    #[test]
    fn finds_drawn_card() {
        let detector = CardDetector::default();
        let result = detector.detect(&png(card_photo())).expect("detect");

        let best = result.best().expect("a card");
        assert_eq!((best.x, best.y, best.width, best.height), (40, 20, 50, 70));
        assert!(best.confidence > 0.9);
    }

    #[test]
    fn results_are_ranked_in_bounds_and_disjoint() {
        let detector = CardDetector::default();
        let result = detector.detect(&png(card_photo())).expect("detect");

        assert!(result.rectangles.len() <= 10);
        for pair in result.rectangles.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        for (i, a) in result.rectangles.iter().enumerate() {
            assert!(a.fits_within(result.image_width, result.image_height));
            for b in &result.rectangles[i + 1..] {
                assert!(iou(a, b) <= 0.3);
            }
        }
    }

    #[test]
    fn detection_is_deterministic() {
        let detector = CardDetector::default();
        let bytes = png(card_photo());
        let first = detector.detect(&bytes).expect("first");
        let second = detector.detect(&bytes).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn rectangles_map_back_to_source_coordinates() {
        // Cards drawn at twice the analysis resolution; outlines land near
        // the 80x112 windows at (40, 40) and (160, 40) of the 800x800
        // analysis image.
        let mut img = image::RgbaImage::from_pixel(1600, 1600, Rgba([20, 20, 20, 255]));
        draw_filled_rect_mut(&mut img, Rect::at(82, 82).of_size(158, 222), Rgba([240, 240, 240, 255]));
        draw_filled_rect_mut(&mut img, Rect::at(322, 82).of_size(158, 222), Rgba([240, 240, 240, 255]));
        let result = CardDetector::default()
            .detect(&png(DynamicImage::ImageRgba8(img)))
            .expect("detect");

        assert_eq!((result.analysis_width, result.analysis_height), (800, 800));
        assert!(!result.rectangles.is_empty());
        for (i, a) in result.rectangles.iter().enumerate() {
            assert!(a.fits_within(1600, 1600), "{a:?}");
            assert_eq!(a.x % 2, 0, "{a:?}");
            for b in &result.rectangles[i + 1..] {
                assert!(iou(a, b) <= 0.3, "{a:?} {b:?}");
            }
        }
    }

    #[test]
    fn unvalidated_config_does_not_panic() {
        let mut config = CardCropConfig::default();
        config.detection.min_window_px = 120.0;
        assert!(config.validate().is_err());

        let result = CardDetector::new(config).detect_image(&card_photo()).expect("detect");
        assert!(result.windows_evaluated <= 100);
    }

    #[test]
    fn corrupt_bytes_are_a_decode_error() {
        let result = CardDetector::default().detect(b"\x89PNG\r\n\x1a\nnot really");
        assert!(matches!(result, Err(CardCropError::Decode(_))));
    }

    #[test]
    fn expired_deadline_stops_before_first_stage() {
        let detector = CardDetector::default().with_deadline(Instant::now());
        let result = detector.detect(&png(card_photo()));
        assert!(matches!(result, Err(CardCropError::DeadlineExceeded { stage: "decode" })));
    }

    #[test]
    fn edge_map_matches_analysis_size() {
        let detector = CardDetector::default();
        let map = detector.edge_map(&DynamicImage::ImageLuma8(GrayImage::new(2000, 500)));
        assert_eq!((map.width(), map.height()), (800, 200));
    }

    #[tokio::test]
    async fn async_detection_matches_sync() {
        let detector = CardDetector::default();
        let bytes = png(card_photo());
        let sync = detector.detect(&bytes).expect("sync");
        let async_result = detector.detect_async(&bytes).await.expect("async");
        assert_eq!(sync, async_result);
    }
}
