//! Error handling for embedguard

use thiserror::Error;

/// Main error type for embedguard
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("No video identifier in locator: {0}")]
    ExtractionFailed(String),

    #[error("Player reported error code {code:?} for {locator}")]
    Playback { locator: String, code: Option<i32> },

    #[error("Player API script never became available")]
    LoaderUnavailable,

    #[error("Element is no longer attached to the page: {0}")]
    ElementDetached(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
