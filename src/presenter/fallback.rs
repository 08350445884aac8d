//! Link-out replacement for embeds that cannot play

use crate::extractor::{SourceBuilder, VideoId};
use crate::page::{ElementId, Markup, Page};
use crate::utils::config::EmbedSettings;
use crate::utils::error::EmbedError;
use anyhow::Result;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackPresenter {
    container_class: String,
    message: String,
    link_label: String,
}

impl FallbackPresenter {
    pub fn new(settings: &EmbedSettings) -> Self {
        Self {
            container_class: settings.container_class.clone(),
            message: settings.fallback_message.clone(),
            link_label: settings.fallback_link_label.clone(),
        }
    }

    pub fn markup(&self, video_id: &VideoId) -> Markup {
        Markup::new("div")
            .class("video-fallback")
            .attr("role", "note")
            .child(Markup::new("p").text(self.message.as_str()))
            .child(
                Markup::new("a")
                    .class("video-fallback__link")
                    .attr("href", SourceBuilder::watch_url(video_id))
                    .attr("target", "_blank")
                    .attr("rel", "noopener noreferrer")
                    .text(self.link_label.as_str()),
            )
    }

    /// Replace everything in the element's embed container (or its parent)
    /// with the link-out. Returns the container.
    pub async fn present(
        &self,
        page: &dyn Page,
        element: ElementId,
        video_id: &VideoId,
    ) -> Result<ElementId> {
        let container = match page.closest(element, &self.container_class).await {
            Some(container) => container,
            None => page
                .parent(element)
                .await
                .ok_or_else(|| EmbedError::ElementDetached(element.to_string()))?,
        };

        page.replace_children(container, vec![self.markup(video_id)])
            .await?;
        info!("Presented fallback for video {} in {}", video_id, container);
        Ok(container)
    }
}
