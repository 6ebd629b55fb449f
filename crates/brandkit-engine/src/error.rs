//! User-facing failure taxonomy.
//!
//! `Display` of every variant is the text shown to the user, so callers can
//! render `err.to_string()` in place without further formatting.

use std::fmt;

pub mod messages {
    pub const MISSING_IMAGE: &str = "Please upload a product image first.";
    pub const MISSING_PROMPT: &str = "Please enter a short description of your product.";
    pub const NO_IMAGE_DATA: &str = "No image data found in API response.";
    pub const GENERIC_JOB_FAILURE: &str = "Image generation failed. Please try again.";
    pub const DESCRIPTION_FIELD_PASTE: &str = "Images cannot be pasted into the description field. \
         Paste the image into the product image area instead.";
    pub const IMAGE_TOO_LARGE: &str = "Image is too large. Please use an image under 10MB.";
    pub const UNSUPPORTED_FORMAT: &str = "Unsupported image format. Please use JPEG, PNG, WEBP, or GIF.";
    pub const EXTRACTION_FAILED: &str = "Could not read the pasted image. \
         Try saving it to a file and uploading it instead.";
    pub const EMPTY_IMAGE: &str = "The selected image is empty.";
    pub const ENCODING_FAILED: &str = "Failed to process the image for upload. \
         Please try a different image.";
}

/// Why one encoding strategy was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    pub strategy: &'static str,
    pub reason: String,
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StudioError {
    /// Missing image or prompt, or a selected file that fails the size or
    /// format check. Nothing else changes.
    #[error("{0}")]
    Validation(String),

    /// Zero-length image; no encoding strategy was attempted.
    #[error("{}", messages::EMPTY_IMAGE)]
    InvalidInput,

    /// Every encoding strategy failed.
    #[error("{}", messages::ENCODING_FAILED)]
    Encoding { attempts: Vec<StrategyFailure> },

    /// Only ever logged.
    #[error("avatar description step failed: {0}")]
    AvatarStep(String),

    /// Failure of a single asset, shown on that asset only.
    #[error("{0}")]
    Job(String),

    /// Clipboard paste could not produce an acceptable image.
    #[error("{0}")]
    Extraction(String),
}

#[cfg(test)]
mod tests {
    use super::{messages, StrategyFailure, StudioError};

    #[test]
    fn display_is_the_user_facing_message() {
        assert_eq!(
            StudioError::Validation(messages::MISSING_IMAGE.to_string()).to_string(),
            messages::MISSING_IMAGE
        );
        assert_eq!(StudioError::InvalidInput.to_string(), messages::EMPTY_IMAGE);
        let encoding = StudioError::Encoding {
            attempts: vec![StrategyFailure {
                strategy: "data-url",
                reason: "empty payload".to_string(),
            }],
        };
        assert_eq!(encoding.to_string(), messages::ENCODING_FAILED);
    }

    #[test]
    fn strategy_failure_names_the_strategy() {
        let failure = StrategyFailure {
            strategy: "preview-raster",
            reason: "no preview available".to_string(),
        };
        assert_eq!(failure.to_string(), "preview-raster: no preview available");
    }
}
