//! Identifier and host-mode types shared across the embed pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque token identifying a hosted video
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Wrap a token that has already been validated by the extractor
    pub(crate) fn new_unchecked(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Which player domain a locator points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedMode {
    #[default]
    PrivacyEnhanced,
    Standard,
}

impl EmbedMode {
    /// Player host for this mode
    pub fn host(&self) -> &'static str {
        match self {
            EmbedMode::PrivacyEnhanced => "www.youtube-nocookie.com",
            EmbedMode::Standard => "www.youtube.com",
        }
    }

    /// Classify a locator by the host it points at
    pub fn of_locator(locator: &str) -> Self {
        if locator.contains("youtube-nocookie.com") {
            EmbedMode::PrivacyEnhanced
        } else {
            EmbedMode::Standard
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedMode::PrivacyEnhanced => "privacy-enhanced",
            EmbedMode::Standard => "standard",
        }
    }
}
