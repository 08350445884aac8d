//! Player locator construction

use crate::extractor::models::{EmbedMode, VideoId};
use url::form_urlencoded;

/// Builds every locator the embed pipeline writes into the page.
///
/// Output depends only on the video id, the mode and the page origin the
/// builder was created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBuilder {
    origin: String,
}

impl SourceBuilder {
    /// `origin` is the page's own origin, e.g. `https://example.com`
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Supervised player locator (script API enabled)
    pub fn build(&self, id: &VideoId, mode: EmbedMode) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("rel", "0")
            .append_pair("modestbranding", "1")
            .append_pair("playsinline", "1")
            .append_pair("enablejsapi", "1")
            .append_pair("origin", &self.origin)
            .finish();
        format!("https://{}/embed/{}?{}", mode.host(), id, query)
    }

    /// Locator for a player materialized by a click on a lazy preview
    pub fn autoplay(&self, id: &VideoId) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("rel", "0")
            .append_pair("modestbranding", "1")
            .append_pair("playsinline", "1")
            .append_pair("autoplay", "1")
            .append_pair("origin", &self.origin)
            .finish();
        format!(
            "https://{}/embed/{}?{}",
            EmbedMode::PrivacyEnhanced.host(),
            id,
            query
        )
    }

    /// Canonical watch page used by the fallback link-out
    pub fn watch_url(id: &VideoId) -> String {
        format!("https://www.youtube.com/watch?v={id}")
    }

    /// High quality default thumbnail
    pub fn thumbnail_url(id: &VideoId) -> String {
        format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vid() -> VideoId {
        VideoId::new_unchecked("abc123XYZ")
    }

    #[test]
    fn privacy_enhanced_locator() {
        let builder = SourceBuilder::new("https://example.com");
        assert_eq!(
            builder.build(&vid(), EmbedMode::PrivacyEnhanced),
            "https://www.youtube-nocookie.com/embed/abc123XYZ?rel=0&modestbranding=1&playsinline=1&enablejsapi=1&origin=https%3A%2F%2Fexample.com"
        );
    }

    #[test]
    fn standard_locator_only_differs_by_host() {
        let builder = SourceBuilder::new("https://example.com");
        let pe = builder.build(&vid(), EmbedMode::PrivacyEnhanced);
        let std = builder.build(&vid(), EmbedMode::Standard);
        assert!(std.starts_with("https://www.youtube.com/embed/abc123XYZ?"));
        assert_eq!(
            pe.replace("www.youtube-nocookie.com", "www.youtube.com"),
            std
        );
    }

    #[test]
    fn build_is_deterministic() {
        let builder = SourceBuilder::new("https://example.com:8443");
        assert_eq!(
            builder.build(&vid(), EmbedMode::PrivacyEnhanced),
            builder.build(&vid(), EmbedMode::PrivacyEnhanced)
        );
    }

    #[test]
    fn autoplay_locator_drops_script_api() {
        let locator = SourceBuilder::new("https://example.com").autoplay(&vid());
        assert!(locator.starts_with("https://www.youtube-nocookie.com/embed/abc123XYZ?"));
        assert!(locator.contains("autoplay=1"));
        assert!(!locator.contains("enablejsapi"));
        assert!(locator.contains("origin=https%3A%2F%2Fexample.com"));
    }

    #[test]
    fn watch_and_thumbnail_templates() {
        assert_eq!(
            SourceBuilder::watch_url(&vid()),
            "https://www.youtube.com/watch?v=abc123XYZ"
        );
        assert_eq!(
            SourceBuilder::thumbnail_url(&vid()),
            "https://i.ytimg.com/vi/abc123XYZ/hqdefault.jpg"
        );
    }
}
