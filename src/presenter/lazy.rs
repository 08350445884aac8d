//! Click-to-load previews
//!
//! A lazy container wraps exactly one trusted embed. Its contents are
//! swapped for a thumbnail and a play button; the first activation swaps
//! the preview for an autoplaying player. There is no way back.

use crate::controller::claims::{ClaimRegistry, Owner};
use crate::events::{EmbedEvent, EventSink, SkipReason};
use crate::extractor::{SourceBuilder, VideoId, VideoIdExtractor};
use crate::page::{ElementId, Markup, Page, Query};
use crate::utils::config::EmbedSettings;
use crate::utils::error::EmbedError;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// An installed preview waiting for its activation
#[derive(Debug)]
pub struct LazyPreview {
    pub container: ElementId,
    pub button: ElementId,
    pub video_id: VideoId,
    activation: JoinHandle<Option<ElementId>>,
}

impl LazyPreview {
    /// Wait for the click and return the player element it created.
    ///
    /// `None` when the preview was removed before anyone clicked it.
    pub async fn activated(self) -> Option<ElementId> {
        self.activation.await.ok().flatten()
    }
}

pub struct LazyReveal {
    page: Arc<dyn Page>,
    settings: Arc<EmbedSettings>,
    extractor: VideoIdExtractor,
    sources: SourceBuilder,
    claims: Arc<ClaimRegistry>,
    events: EventSink,
}

impl LazyReveal {
    pub fn new(
        page: Arc<dyn Page>,
        settings: Arc<EmbedSettings>,
        claims: Arc<ClaimRegistry>,
        events: EventSink,
    ) -> Self {
        let extractor = VideoIdExtractor::new(page.url().clone());
        let sources = SourceBuilder::new(page.origin());
        Self {
            page,
            settings,
            extractor,
            sources,
            claims,
            events,
        }
    }

    /// Install a preview in every eligible lazy container
    pub async fn install(&self) -> Vec<LazyPreview> {
        let containers = self
            .page
            .find_all(&Query::class(self.settings.lazy_container.as_str()))
            .await;

        let mut previews = Vec::new();
        for container in containers {
            match self.install_one(container).await {
                Ok(Some(preview)) => previews.push(preview),
                Ok(None) => {}
                Err(e) => warn!("Failed to install preview in {}: {}", container, e),
            }
        }
        info!("Installed {} lazy previews", previews.len());
        previews
    }

    async fn install_one(&self, container: ElementId) -> Result<Option<LazyPreview>> {
        let embeds = self
            .page
            .find_all(
                &Query::tag("iframe")
                    .with_class(self.settings.trusted_marker.as_str())
                    .within(container),
            )
            .await;
        if embeds.len() != 1 {
            debug!("Lazy container {} holds {} embeds, skipping", container, embeds.len());
            self.skip(container, SkipReason::EmbedCount);
            return Ok(None);
        }

        let locator = self.page.attribute(embeds[0], "src").await.unwrap_or_default();
        let Some(video_id) = self.extractor.extract(&locator) else {
            debug!("No video id in lazy embed {:?}", locator);
            self.skip(container, SkipReason::NoVideoId);
            return Ok(None);
        };

        let inserted = self
            .page
            .replace_children(container, vec![self.preview_markup(&video_id)])
            .await?;
        let button = inserted
            .first()
            .copied()
            .ok_or_else(|| EmbedError::ElementDetached(container.to_string()))?;
        let mut clicks = self.page.activations(button).await?;

        self.events.emit(EmbedEvent::PreviewInstalled {
            container,
            video_id: video_id.clone(),
            timestamp: Utc::now(),
        });

        let page = self.page.clone();
        let events = self.events.clone();
        let claims = self.claims.clone();
        let player = self.player_markup(&video_id);
        let activated_id = video_id.clone();

        let activation = tokio::spawn(async move {
            clicks.recv().await?;
            drop(clicks);

            // Reserved up front so a page-wide scan racing the insert leaves it alone
            let identity = player.attributes.get("id").cloned().unwrap_or_default();
            if !claims.reserve(&identity, Owner::LazyPlayer).await {
                debug!("Lazy player identity {} was already taken", identity);
            }

            match page.replace_children(container, vec![player]).await {
                Ok(ids) => {
                    if let Some(element) = ids.first().copied() {
                        if !claims.try_claim(element, &identity, Owner::LazyPlayer).await {
                            debug!("Lazy player {} ({}) not claimed", element, identity);
                        }
                    }
                    info!("Activated lazy player for {}", activated_id);
                    events.emit(EmbedEvent::PreviewActivated {
                        container,
                        video_id: activated_id,
                        timestamp: Utc::now(),
                    });
                    ids.first().copied()
                }
                Err(e) => {
                    warn!("Failed to activate lazy player for {}: {}", activated_id, e);
                    None
                }
            }
        });

        Ok(Some(LazyPreview {
            container,
            button,
            video_id,
            activation,
        }))
    }

    fn skip(&self, element: ElementId, reason: SkipReason) {
        self.events.emit(EmbedEvent::Skipped {
            element,
            scope: None,
            reason,
            timestamp: Utc::now(),
        });
    }

    fn preview_markup(&self, video_id: &VideoId) -> Markup {
        Markup::new("button")
            .class("video-lazy__preview")
            .attr("type", "button")
            .attr("aria-label", self.settings.play_label.as_str())
            .child(
                Markup::new("img")
                    .attr("src", SourceBuilder::thumbnail_url(video_id))
                    .attr("alt", "")
                    .attr("loading", "lazy")
                    .attr("decoding", "async"),
            )
            .child(
                Markup::new("span")
                    .class("video-lazy__play")
                    .attr("aria-hidden", "true"),
            )
    }

    fn player_markup(&self, video_id: &VideoId) -> Markup {
        Markup::new("iframe")
            .attr("id", ClaimRegistry::new_identity("lazy"))
            .attr("src", self.sources.autoplay(video_id))
            .attr("title", "YouTube video player")
            .attr(
                "allow",
                "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture",
            )
            .attr("allowfullscreen", "")
            .attr("frameborder", "0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::MemoryPage;
    use url::Url;

    fn lazy_page(body: Vec<Markup>) -> Arc<MemoryPage> {
        Arc::new(MemoryPage::with_body(
            Url::parse("https://example.com/").unwrap(),
            body,
        ))
    }

    fn reveal(page: Arc<MemoryPage>) -> LazyReveal {
        LazyReveal::new(
            page,
            Arc::new(EmbedSettings::default()),
            Arc::new(ClaimRegistry::new()),
            EventSink::default(),
        )
    }

    fn trusted(src: &str) -> Markup {
        Markup::new("iframe").class("js-video-embed").attr("src", src)
    }

    #[tokio::test]
    async fn preview_then_player_on_click() {
        let page = lazy_page(vec![Markup::new("div")
            .class("video-lazy")
            .child(trusted("https://www.youtube.com/embed/abc123XYZ"))]);
        let previews = reveal(page.clone()).install().await;
        assert_eq!(previews.len(), 1);

        let preview = &previews[0];
        let container = page.snapshot(preview.container).await.unwrap();
        assert!(!container.contains_tag("iframe"));
        let imgs = container.find_all("img");
        assert_eq!(
            imgs[0].attributes["src"],
            "https://i.ytimg.com/vi/abc123XYZ/hqdefault.jpg"
        );

        assert!(page.click(previews[0].button).await);
        let preview = previews.into_iter().next().unwrap();
        let container_id = preview.container;
        let player = preview.activated().await.unwrap();

        let container = page.snapshot(container_id).await.unwrap();
        assert_eq!(container.children.len(), 1);
        assert!(!container.contains_tag("button"));
        let src = page.attribute(player, "src").await.unwrap();
        assert!(src.starts_with("https://www.youtube-nocookie.com/embed/abc123XYZ?"));
        assert!(src.contains("autoplay=1"));
    }

    #[tokio::test]
    async fn activated_player_is_claimed_by_its_node() {
        let page = lazy_page(vec![Markup::new("div")
            .class("video-lazy")
            .child(trusted("https://www.youtube.com/embed/abc123XYZ"))]);
        let claims = Arc::new(ClaimRegistry::new());
        let reveal = LazyReveal::new(
            page.clone(),
            Arc::new(EmbedSettings::default()),
            claims.clone(),
            EventSink::default(),
        );

        let preview = reveal.install().await.into_iter().next().unwrap();
        assert!(page.click(preview.button).await);
        let player = preview.activated().await.unwrap();

        let identity = page.attribute(player, "id").await.unwrap();
        assert_eq!(claims.owner(player).await, Some(Owner::LazyPlayer));
        assert_eq!(claims.holder(&identity).await, Some(player));
        assert!(!claims.reserve(&identity, Owner::LazyPlayer).await);
    }

    #[tokio::test]
    async fn unrecognised_embed_left_untouched() {
        let page = lazy_page(vec![Markup::new("div")
            .class("video-lazy")
            .child(trusted("https://player.vimeo.com/video/1"))]);
        let before = page.render_html().await;
        assert!(reveal(page.clone()).install().await.is_empty());
        assert_eq!(page.render_html().await, before);
    }

    #[tokio::test]
    async fn container_with_two_embeds_is_skipped() {
        let page = lazy_page(vec![Markup::new("div")
            .class("video-lazy")
            .child(trusted("https://www.youtube.com/embed/abc123XYZ"))
            .child(trusted("https://www.youtube.com/embed/def456UVW"))]);
        assert!(reveal(page).install().await.is_empty());
    }
}
