// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Detection sessions — turn a batch of uploads into cropped cards.
//
// Images are processed one after another. A failure on one image is logged,
// recorded as a skipped item, and never stops the rest of the batch. A crop
// failure keeps the original image and is recorded as a degraded item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use cardcrop_core::error::Result;
use cardcrop_core::fingerprint::{hash_bytes, short_digest};
use cardcrop_core::human_errors::{HumanError, humanize_error};
use cardcrop_core::{
    BoundsSource, CardCropConfig, CardCropError, CropBounds, DetectionResult, OutputFormat, SessionId,
};
use image::DynamicImage;

use crate::crop::{Cropper, bounds_from_rectangle};
use crate::detector::CardDetector;
use crate::image::processor;

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl BatchInput {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// A successfully processed image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCard {
    /// Position of the input within the session.
    pub index: usize,
    pub name: String,
    /// SHA-256 of the uploaded bytes.
    pub source_digest: String,
    pub detection: DetectionResult,
    pub bounds_source: BoundsSource,
    /// Crop window actually rendered; `None` when the original was kept.
    pub bounds: Option<CropBounds>,
    /// Format of `output`; `None` when the original was kept.
    pub format: Option<OutputFormat>,
    pub fell_back_to_original: bool,
    /// Encoded card image.
    #[serde(skip)]
    pub output: Vec<u8>,
}

/// An image that was skipped, or whose card is the uncropped original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchIssue {
    pub index: usize,
    pub name: String,
    pub error: String,
    pub human: HumanError,
}

/// Outcome of the session so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub processed: usize,
    pub succeeded: usize,
    /// Inputs that produced no card.
    pub skipped: Vec<BatchIssue>,
    /// Cards that kept the original image because the crop failed.
    pub degraded: Vec<BatchIssue>,
}

/// A card plus the crop error that forced it back to the original image.
type Outcome = (SessionCard, Option<CardCropError>);

/// Groups the cards produced from one batch upload.
pub struct DetectionSession {
    id: SessionId,
    created_at: DateTime<Utc>,
    detector: CardDetector,
    cropper: Cropper,
    cards: Vec<SessionCard>,
    skipped: Vec<BatchIssue>,
    degraded: Vec<BatchIssue>,
}

impl DetectionSession {
    pub fn new(config: CardCropConfig) -> Self {
        Self {
            id: SessionId::new(),
            created_at: Utc::now(),
            detector: CardDetector::new(config.clone()),
            cropper: Cropper::new(config),
            cards: Vec::new(),
            skipped: Vec::new(),
            degraded: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn cards(&self) -> &[SessionCard] {
        &self.cards
    }

    pub fn skipped(&self) -> &[BatchIssue] {
        &self.skipped
    }

    pub fn degraded(&self) -> &[BatchIssue] {
        &self.degraded
    }

    /// Process a batch sequentially. Never fails; see [`BatchSummary`].
    #[instrument(skip_all, fields(session = %self.id))]
    pub fn process(&mut self, inputs: impl IntoIterator<Item = BatchInput>) -> BatchSummary {
        for input in inputs {
            let index = self.next_index();
            let result = self.process_one(index, &input);
            self.record(index, input.name, result);
        }
        self.summary()
    }

    /// Async variant of [`DetectionSession::process`] that yields to the
    /// runtime between pipeline stages.
    #[instrument(skip_all, fields(session = %self.id))]
    pub async fn process_async(&mut self, inputs: Vec<BatchInput>) -> BatchSummary {
        for input in inputs {
            let index = self.next_index();
            let result = self.process_one_async(index, &input).await;
            self.record(index, input.name, result);
        }
        self.summary()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            session_id: self.id,
            created_at: self.created_at,
            processed: self.cards.len() + self.skipped.len(),
            succeeded: self.cards.len(),
            skipped: self.skipped.clone(),
            degraded: self.degraded.clone(),
        }
    }

    fn next_index(&self) -> usize {
        self.cards.len() + self.skipped.len()
    }

    fn process_one(&self, index: usize, input: &BatchInput) -> Result<Outcome> {
        let image = processor::decode(&input.bytes)?;
        let detection = self.detector.detect_image(&image)?;
        Ok(self.build_card(index, input, &image, detection))
    }

    async fn process_one_async(&self, index: usize, input: &BatchInput) -> Result<Outcome> {
        let image = processor::decode(&input.bytes)?;
        tokio::task::yield_now().await;
        let detection = self.detector.detect_image_async(&image).await?;
        tokio::task::yield_now().await;
        Ok(self.build_card(index, input, &image, detection))
    }

    /// Choose bounds, crop, and fall back to the original bytes when the
    /// crop cannot be produced. The crop error, if any, is returned with
    /// the card.
    fn build_card(
        &self,
        index: usize,
        input: &BatchInput,
        image: &DynamicImage,
        detection: DetectionResult,
    ) -> Outcome {
        let source_digest = hash_bytes(&input.bytes);

        let (bounds, bounds_source) = match detection.best() {
            Some(best) => (
                bounds_from_rectangle(best),
                BoundsSource::Detected {
                    confidence: best.confidence,
                },
            ),
            None => (self.cropper.smart_bounds(image), BoundsSource::Smart),
        };

        let crop = &self.cropper.config().crop;
        match self
            .cropper
            .crop_decoded(image, bounds, crop.output_width, crop.output_height, crop.format)
        {
            Ok(output) => (
                SessionCard {
                    index,
                    name: input.name.clone(),
                    source_digest,
                    detection,
                    bounds_source,
                    bounds: output.bounds,
                    format: output.format,
                    fell_back_to_original: false,
                    output: output.bytes,
                },
                None,
            ),
            Err(err) => (
                SessionCard {
                    index,
                    name: input.name.clone(),
                    source_digest,
                    detection,
                    bounds_source,
                    bounds: None,
                    format: None,
                    fell_back_to_original: true,
                    output: input.bytes.clone(),
                },
                Some(err),
            ),
        }
    }

    fn record(&mut self, index: usize, name: String, result: Result<Outcome>) {
        match result {
            Ok((card, Some(crop_err))) => {
                warn!(index, name = %name, error = %crop_err, "Crop failed; keeping original image");
                self.degraded.push(batch_issue(index, name, &crop_err));
                self.cards.push(card);
            }
            Ok((card, None)) => {
                info!(
                    index,
                    name = %card.name,
                    digest = short_digest(&card.source_digest),
                    candidates = card.detection.rectangles.len(),
                    "Card produced"
                );
                self.cards.push(card);
            }
            Err(err) => {
                warn!(index, name = %name, error = %err, "Skipping image");
                self.skipped.push(batch_issue(index, name, &err));
            }
        }
    }
}

fn batch_issue(index: usize, name: String, err: &CardCropError) -> BatchIssue {
    BatchIssue {
        index,
        name,
        error: err.to_string(),
        human: humanize_error(err),
    }
}
