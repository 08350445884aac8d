//! Page scan and controller fan-out

use crate::controller::claims::{ClaimRegistry, Owner};
use crate::controller::machine::{EmbedController, EmbedReport, EmbedTarget};
use crate::controller::policy::Scope;
use crate::events::{EmbedEvent, EventSink, SkipReason};
use crate::extractor::{SourceBuilder, VideoId, VideoIdExtractor};
use crate::page::{ElementId, Page, Query};
use crate::player::{ApiLoader, PlayerFactory};
use crate::presenter::{FallbackPresenter, LazyPreview, LazyReveal};
use crate::utils::config::EmbedSettings;
use crate::utils::error::EmbedError;
use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use regex::Regex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Everything started by [`EmbedSupervisor::run_page`]
#[derive(Debug)]
pub struct PageRun {
    pub previews: Vec<LazyPreview>,
    pub controllers: Vec<ControllerTask>,
}

/// A spawned controller and the element it supervises
#[derive(Debug)]
pub struct ControllerTask {
    pub element: ElementId,
    pub identity: String,
    pub video_id: VideoId,
    handle: JoinHandle<EmbedReport>,
}

impl ControllerTask {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Result of [`EmbedSupervisor::collect_until`]
#[derive(Debug, Default)]
pub struct Settlement {
    pub reports: Vec<EmbedReport>,
    /// Controllers still running at the deadline
    pub unsettled: Vec<ControllerTask>,
}

enum Joined {
    Settled(EmbedReport),
    Pending(ControllerTask),
    Lost,
}

/// Discovers embeds and runs one controller per claimed element
pub struct EmbedSupervisor {
    page: Arc<dyn Page>,
    players: Arc<dyn PlayerFactory>,
    loader: Arc<ApiLoader>,
    settings: Arc<EmbedSettings>,
    claims: Arc<ClaimRegistry>,
    events: EventSink,
    extractor: VideoIdExtractor,
    sources: SourceBuilder,
    host_pattern: Regex,
}

impl EmbedSupervisor {
    pub fn new(
        page: Arc<dyn Page>,
        players: Arc<dyn PlayerFactory>,
        loader: Arc<ApiLoader>,
        settings: EmbedSettings,
    ) -> Result<Self> {
        let settings = settings.sanitized()?;
        let hosts = settings
            .video_hosts
            .iter()
            .map(|h| regex::escape(h.trim()))
            .collect::<Vec<_>>()
            .join("|");
        let host_pattern = Regex::new(&format!(r"(?i)//(?:[a-z0-9-]+\.)*(?:{hosts})/embed/"))
            .context("Failed to compile video host pattern")?;

        let extractor = VideoIdExtractor::new(page.url().clone());
        let sources = SourceBuilder::new(page.origin());

        Ok(Self {
            page,
            players,
            loader,
            settings: Arc::new(settings),
            claims: Arc::new(ClaimRegistry::new()),
            events: EventSink::default(),
            extractor,
            sources,
            host_pattern,
        })
    }

    /// Send lifecycle events to `events`
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn claims(&self) -> Arc<ClaimRegistry> {
        self.claims.clone()
    }

    pub fn settings(&self) -> &EmbedSettings {
        &self.settings
    }

    pub fn lazy_reveal(&self) -> LazyReveal {
        LazyReveal::new(
            self.page.clone(),
            self.settings.clone(),
            self.claims.clone(),
            self.events.clone(),
        )
    }

    /// Lazy previews first, then the trusted scope, then the page-wide scope
    pub async fn run_page(&self) -> PageRun {
        let previews = self.lazy_reveal().install().await;
        let mut controllers = self.supervise(Scope::Trusted).await;
        controllers.extend(self.supervise(Scope::PageWide).await);
        info!(
            "Supervising {} embeds, {} lazy previews installed",
            controllers.len(),
            previews.len()
        );
        PageRun {
            previews,
            controllers,
        }
    }

    /// Claim every unclaimed element of `scope` and spawn its controller
    pub async fn supervise(&self, scope: Scope) -> Vec<ControllerTask> {
        let policy = scope.policy(&self.settings);
        let fallback = FallbackPresenter::new(&self.settings);

        self.discover(scope)
            .await
            .into_iter()
            .map(|target| {
                let element = target.element;
                let identity = target.identity.clone();
                let video_id = target.video_id.clone();
                let controller = EmbedController::new(
                    target,
                    policy,
                    self.page.clone(),
                    self.players.clone(),
                    self.loader.clone(),
                    self.sources.clone(),
                    fallback.clone(),
                    self.events.clone(),
                );
                ControllerTask {
                    element,
                    identity,
                    video_id,
                    handle: tokio::spawn(controller.run()),
                }
            })
            .collect()
    }

    /// Elements of `scope` with a video id that no one has claimed yet.
    /// Each returned target is now claimed by `scope`.
    pub async fn discover(&self, scope: Scope) -> Vec<EmbedTarget> {
        let mut targets = Vec::new();
        for element in self.candidates(scope).await {
            let locator = self.page.attribute(element, "src").await.unwrap_or_default();
            let Some(video_id) = self.extractor.extract(&locator) else {
                debug!("Skipping {}: {}", element, EmbedError::ExtractionFailed(locator));
                self.skip(element, scope, SkipReason::NoVideoId);
                continue;
            };

            let identity = match self.ensure_identity(element).await {
                Ok(identity) => identity,
                Err(e) => {
                    warn!("Cannot assign identity to {}: {}", element, e);
                    continue;
                }
            };

            if !self
                .claims
                .try_claim(element, &identity, Owner::Controller(scope))
                .await
            {
                self.skip(element, scope, SkipReason::AlreadyClaimed);
                continue;
            }

            self.events.emit(EmbedEvent::Discovered {
                identity: identity.clone(),
                video_id: video_id.clone(),
                scope,
                timestamp: Utc::now(),
            });
            targets.push(EmbedTarget {
                element,
                identity,
                video_id,
                scope,
            });
        }
        debug!("{} scope claimed {} embeds", scope.as_str(), targets.len());
        targets
    }

    /// Wait for every controller, dropping ones that panicked or were aborted
    pub async fn collect(controllers: Vec<ControllerTask>) -> Vec<EmbedReport> {
        join_all(controllers.into_iter().map(|task| task.handle))
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("Embed controller did not finish: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Wait for every controller until `deadline`. Settled reports are kept
    /// even when other controllers are still running.
    pub async fn collect_until(controllers: Vec<ControllerTask>, deadline: Instant) -> Settlement {
        let joined = join_all(controllers.into_iter().map(|mut task| async move {
            let waited = tokio::time::timeout_at(deadline, &mut task.handle).await;
            match waited {
                Ok(Ok(report)) => Joined::Settled(report),
                Ok(Err(e)) => {
                    warn!("Embed controller for {} did not finish: {}", task.identity, e);
                    Joined::Lost
                }
                Err(_) => Joined::Pending(task),
            }
        }))
        .await;

        let mut settlement = Settlement::default();
        for outcome in joined {
            match outcome {
                Joined::Settled(report) => settlement.reports.push(report),
                Joined::Pending(task) => settlement.unsettled.push(task),
                Joined::Lost => {}
            }
        }
        settlement
    }

    async fn candidates(&self, scope: Scope) -> Vec<ElementId> {
        match scope {
            Scope::Trusted => {
                self.page
                    .find_all(&Query::tag("iframe").with_class(self.settings.trusted_marker.as_str()))
                    .await
            }
            Scope::PageWide => {
                let mut matching = Vec::new();
                for element in self.page.find_all(&Query::tag("iframe")).await {
                    let src = self.page.attribute(element, "src").await.unwrap_or_default();
                    if self.host_pattern.is_match(&src) {
                        matching.push(element);
                    }
                }
                matching
            }
        }
    }

    /// The element's `id`, assigned once when missing. An `id` already
    /// claimed by another element is replaced by a fresh one.
    async fn ensure_identity(&self, element: ElementId) -> Result<String> {
        if let Some(id) = self.page.attribute(element, "id").await {
            if !id.trim().is_empty() {
                match self.claims.holder(&id).await {
                    None => return Ok(id),
                    Some(holder) if holder == element => return Ok(id),
                    Some(holder) => {
                        debug!("{} shares id {:?} with {}, reassigning", element, id, holder);
                    }
                }
            }
        }
        let identity = ClaimRegistry::new_identity("embed");
        self.page.set_attribute(element, "id", &identity).await?;
        Ok(identity)
    }

    fn skip(&self, element: ElementId, scope: Scope, reason: SkipReason) {
        self.events.emit(EmbedEvent::Skipped {
            element,
            scope: Some(scope),
            reason,
            timestamp: Utc::now(),
        });
    }
}
