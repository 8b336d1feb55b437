// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Error types for the crop engine.
//!
//! Every failure the engine can report is a [`CropError`]. None of them are
//! fatal to the host: each one maps to a user-facing notice through
//! [`CropError::notice`] that names the way forward.

use thiserror::Error;

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, CropError>;

/// Errors raised by acquisition, region editing and export.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CropError {
    #[error("timed out loading {url} after {attempts} attempt(s)")]
    AcquisitionTimeout { url: String, attempts: u32 },

    #[error("could not load {url} after {attempts} attempt(s): {reason}")]
    AcquisitionExhausted {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("region limit of {limit} reached")]
    RegionLimitExceeded { limit: usize },

    #[error("the main region cannot be deleted")]
    CannotDeleteMainRegion,

    #[error("source pixels cannot be read (cross-origin read blocked)")]
    PixelReadBlocked,

    #[error("no region with id {0:?}")]
    UnknownRegion(String),

    #[error("no gesture is in progress")]
    NoActiveGesture,

    #[error("image is not loaded")]
    ImageNotReady,

    #[error("crop area does not overlap the image")]
    EmptyCrop,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("settings error: {0}")]
    Settings(String),
}

impl CropError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Human-readable notice for the status bar, including what the user can
    /// do next.
    pub fn notice(&self) -> String {
        match self {
            Self::AcquisitionTimeout { .. } | Self::AcquisitionExhausted { .. } => format!(
                "{self}. Retry, or skip cropping and use the original image."
            ),
            Self::RegionLimitExceeded { limit } => {
                format!("You can have at most {limit} regions. Delete one to add another.")
            }
            Self::CannotDeleteMainRegion => {
                "The main region can be hidden but not deleted.".to_string()
            }
            Self::PixelReadBlocked => "This image host blocks pixel access. Re-upload the image, \
                 or continue with the original, unedited image."
                .to_string(),
            Self::EmptyCrop => {
                "The crop area is outside the image. Move it back over the image.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether a manual retry of the acquisition makes sense.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AcquisitionTimeout { .. } | Self::AcquisitionExhausted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquisition_notices_offer_fallback() {
        let err = CropError::AcquisitionExhausted {
            url: "https://cdn.example/card.png".to_string(),
            attempts: 6,
            reason: "not found".to_string(),
        };
        let notice = err.notice();
        assert!(notice.contains("6 attempt(s)"));
        assert!(notice.contains("original image"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_local_failures_are_not_retryable() {
        assert!(!CropError::CannotDeleteMainRegion.is_retryable());
        assert!(!CropError::RegionLimitExceeded { limit: 8 }.is_retryable());
        assert!(CropError::RegionLimitExceeded { limit: 8 }
            .notice()
            .contains("at most 8"));
    }

    #[test]
    fn test_pixel_read_blocked_suggests_reupload() {
        let notice = CropError::PixelReadBlocked.notice();
        assert!(notice.contains("Re-upload"));
        assert!(notice.contains("original"));
    }
}
