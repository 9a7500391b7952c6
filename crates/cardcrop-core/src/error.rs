// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for cardcrop.

use thiserror::Error;

/// Top-level error type for all cardcrop operations.
///
/// There is no "no rectangle found" variant: detection returns an empty
/// candidate list instead.
#[derive(Debug, Error)]
pub enum CardCropError {
    // -- Image errors --
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode crop: {0}")]
    Encode(String),

    #[error("crop region is empty after clamping ({width}x{height})")]
    EmptyCrop { width: u32, height: u32 },

    // -- Scheduling --
    #[error("detection deadline exceeded before stage '{stage}'")]
    DeadlineExceeded { stage: &'static str },

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CardCropError {
    /// Whether a crop can fall back to the original image after this error.
    pub fn is_recoverable_by_fallback(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Encode(_) | Self::EmptyCrop { .. })
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CardCropError>;
