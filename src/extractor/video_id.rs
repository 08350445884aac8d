//! Recover a video identifier from a player locator

use crate::extractor::models::VideoId;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

static EMBED_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/embed/([A-Za-z0-9_-]{6,})").expect("embed path pattern"));

static QUERY_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("query id pattern"));

/// Extracts [`VideoId`]s from `src` attributes.
///
/// Relative locators are resolved against the page URL the extractor was
/// created with, so `/watch?v=ID` works the same as a fully qualified link.
#[derive(Debug, Clone)]
pub struct VideoIdExtractor {
    base: Url,
}

impl VideoIdExtractor {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    /// `/embed/<token>` first, then the `v` query parameter
    pub fn extract(&self, locator: &str) -> Option<VideoId> {
        if let Some(caps) = EMBED_PATH_RE.captures(locator) {
            return Some(VideoId::new_unchecked(&caps[1]));
        }

        let parsed = match self.base.join(locator.trim()) {
            Ok(url) => url,
            Err(e) => {
                debug!("Unparseable locator {:?}: {}", locator, e);
                return None;
            }
        };

        parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .filter(|value| QUERY_ID_RE.is_match(value))
            .map(VideoId::new_unchecked)
    }
}
