//! Error types for flashdeck-gen
//!
//! Only document-level failures and an empty result are fatal for a run.
//! Generation-call failures live in [`crate::llm::GenerationError`] and are
//! absorbed per attempt by the synthesizer.

use thiserror::Error;

/// Deck generation error type
#[derive(Debug, Error)]
pub enum GenError {
    /// File extension is not one of pdf, docx, txt
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// The underlying reader could not open or parse the document
    #[error("Extraction failed for {path}: {message}")]
    Extraction { path: String, message: String },

    /// The caller-supplied section plan could not be used
    #[error("Invalid section plan: {0}")]
    InvalidPlan(String),

    /// The whole run produced no usable card
    #[error("Generation produced zero cards")]
    NoCards,

    /// Configuration problem (missing API key, bad client settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Background task failed to complete
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GenError {
    pub(crate) fn extraction(path: &std::path::Path, message: impl std::fmt::Display) -> Self {
        GenError::Extraction {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }
}

/// Result type for deck generation
pub type GenResult<T> = Result<T, GenError>;
