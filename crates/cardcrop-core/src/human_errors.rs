// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for batch summaries.
//
// A skipped upload is reported to the end user, never thrown at them, so
// every technical error is mapped to plain English with a suggestion.

use crate::error::CardCropError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The card was still produced (e.g. uncropped original).
    Degraded,
    /// Trying again may help.
    Transient,
    /// The input itself is unusable.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HumanError {
    pub message: String,
    pub suggestion: String,
    pub severity: Severity,
}

/// Convert a `CardCropError` into a `HumanError`.
pub fn humanize_error(err: &CardCropError) -> HumanError {
    match err {
        CardCropError::Decode(_) => HumanError {
            message: "We couldn't read this photo.".into(),
            suggestion: "Make sure the file is a JPEG or PNG image and isn't damaged, then upload it again.".into(),
            severity: Severity::Permanent,
        },

        CardCropError::Encode(_) | CardCropError::EmptyCrop { .. } => HumanError {
            message: "We couldn't crop this photo, so the original was kept.".into(),
            suggestion: "Adjust the crop box by hand if the card isn't framed the way you want.".into(),
            severity: Severity::Degraded,
        },

        CardCropError::DeadlineExceeded { .. } => HumanError {
            message: "Finding the card took too long.".into(),
            suggestion: "Try again, or use a smaller photo.".into(),
            severity: Severity::Transient,
        },

        CardCropError::InvalidConfig(detail) => HumanError {
            message: "The cropping settings are invalid.".into(),
            suggestion: format!("Fix the configuration and try again. ({detail})"),
            severity: Severity::Permanent,
        },

        CardCropError::Io(_) => HumanError {
            message: "A file couldn't be read or written.".into(),
            suggestion: "Check that the file exists and that you have permission to use it.".into(),
            severity: Severity::Transient,
        },

        CardCropError::Serialization(_) => HumanError {
            message: "Some saved data is in the wrong format.".into(),
            suggestion: "Check the file contents; it should be valid JSON.".into(),
            severity: Severity::Permanent,
        },
    }
}
