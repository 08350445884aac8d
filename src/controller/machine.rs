//! Per-element embed supervision
//!
//! One [`EmbedController`] task owns one element. Player signals and timer
//! firings arrive on channels and are handled one at a time, so the
//! transitions of a single element never interleave. Every handler goes
//! through [`ControllerState::apply`], which refuses to act once settled.

use crate::controller::policy::{ControllerPolicy, Scope};
use crate::controller::state::{Action, ControllerState, Outcome, SwitchReason, Trigger};
use crate::controller::timers::{TimerHandle, WatchdogPair};
use crate::events::{EmbedEvent, EventSink};
use crate::extractor::{EmbedMode, SourceBuilder, VideoId};
use crate::page::{ElementId, Page};
use crate::player::{
    ApiLoader, PlayerEvent, PlayerEventSink, PlayerFactory, PlayerHandle, PlayerSignal,
};
use crate::presenter::FallbackPresenter;
use crate::utils::error::EmbedError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// A claimed element ready for supervision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedTarget {
    pub element: ElementId,
    pub identity: String,
    pub video_id: VideoId,
    pub scope: Scope,
}

/// Final account of one supervised element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedReport {
    pub element: ElementId,
    pub identity: String,
    pub video_id: VideoId,
    pub scope: Scope,
    pub mode: EmbedMode,
    pub attempted_standard: bool,
    pub outcome: Outcome,
}

pub struct EmbedController {
    target: EmbedTarget,
    policy: ControllerPolicy,
    page: Arc<dyn Page>,
    players: Arc<dyn PlayerFactory>,
    loader: Arc<ApiLoader>,
    sources: SourceBuilder,
    fallback: FallbackPresenter,
    events: EventSink,
    state: ControllerState,
    player: Option<Box<dyn PlayerHandle>>,
    watchdogs: Option<WatchdogPair>,
    retry_timer: Option<TimerHandle>,
}

impl EmbedController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        target: EmbedTarget,
        policy: ControllerPolicy,
        page: Arc<dyn Page>,
        players: Arc<dyn PlayerFactory>,
        loader: Arc<ApiLoader>,
        sources: SourceBuilder,
        fallback: FallbackPresenter,
        events: EventSink,
    ) -> Self {
        Self {
            target,
            policy,
            page,
            players,
            loader,
            sources,
            fallback,
            events,
            state: ControllerState::new(),
            player: None,
            watchdogs: None,
            retry_timer: None,
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Supervise the element until it settles
    pub async fn run(mut self) -> EmbedReport {
        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel::<PlayerSignal>();
        let (timer_tx, mut timer_rx) = mpsc::unbounded_channel::<Trigger>();

        // Normalizing
        if !self.write_locator(EmbedMode::PrivacyEnhanced).await {
            return self.report();
        }
        let mut removed = match self.page.removal(self.target.element).await {
            Ok(removed) => removed,
            Err(e) => {
                debug!("{} vanished before supervision: {}", self.target.identity, e);
                self.conclude(Outcome::Detached).await;
                return self.report();
            }
        };
        let mut watching_removal = true;

        if let Err(e) = self.loader.ensure_loaded().await {
            error!(
                "Player API unavailable, leaving {} unsupervised: {}",
                self.target.identity, e
            );
            self.conclude(Outcome::Unsupervised).await;
            return self.report();
        }

        if let Some((short, long)) = self.policy.watchdogs {
            self.watchdogs = Some(WatchdogPair::arm(short, long, timer_tx.clone()));
        }
        self.attach(&signal_tx, &timer_tx).await;

        while !self.state.is_settled() {
            let trigger = tokio::select! {
                Some(signal) = signal_rx.recv() => {
                    if signal.generation != self.state.generation() {
                        debug!(
                            "Dropping stale {:?} from generation {} on {}",
                            signal.event, signal.generation, self.target.identity
                        );
                        continue;
                    }
                    match signal.event {
                        PlayerEvent::Ready => Trigger::Ready,
                        PlayerEvent::Error(code) => Trigger::Error(Some(code)),
                    }
                }
                Some(trigger) = timer_rx.recv() => trigger,
                gone = &mut removed, if watching_removal => {
                    watching_removal = false;
                    if gone.is_ok() {
                        self.conclude(Outcome::Detached).await;
                    }
                    continue;
                }
                else => break,
            };
            self.handle(trigger, &signal_tx, &timer_tx).await;
        }

        self.report()
    }

    async fn handle(
        &mut self,
        trigger: Trigger,
        signal_tx: &mpsc::UnboundedSender<PlayerSignal>,
        timer_tx: &mpsc::UnboundedSender<Trigger>,
    ) {
        let failed_mode = self.state.mode();
        match self.state.apply(trigger) {
            Action::Ignore => {
                debug!("Ignoring {:?} on {}", trigger, self.target.identity);
            }
            Action::SwitchToStandard(reason) => {
                self.switch_domain(failed_mode, reason, timer_tx).await
            }
            Action::Rebind => {
                self.retry_timer = None;
                self.attach(signal_tx, timer_tx).await;
            }
            Action::Settle(outcome) => self.finish(outcome).await,
        }
    }

    /// Leave `failed_mode` for the standard domain and schedule the rebind
    async fn switch_domain(
        &mut self,
        failed_mode: EmbedMode,
        reason: SwitchReason,
        timer_tx: &mpsc::UnboundedSender<Trigger>,
    ) {
        let failed_locator = self.sources.build(&self.target.video_id, failed_mode);
        match reason {
            SwitchReason::PlayerError(code) => {
                let failure = EmbedError::Playback {
                    locator: failed_locator.clone(),
                    code,
                };
                warn!(
                    "Switching {} to the standard domain: {}",
                    self.target.identity, failure
                );
            }
            SwitchReason::Watchdog => {
                warn!(
                    "Switching {} to the standard domain: no answer from {} in time",
                    self.target.identity, failed_locator
                );
            }
        }
        self.destroy_player();
        self.events.emit(EmbedEvent::DomainSwitched {
            identity: self.target.identity.clone(),
            reason,
            failed_locator,
            timestamp: Utc::now(),
        });

        if !self.write_locator(EmbedMode::Standard).await {
            return;
        }
        self.retry_timer = Some(TimerHandle::schedule(
            self.policy.retry_delay,
            Trigger::RebindDue,
            timer_tx.clone(),
        ));
    }

    /// Bind a player for the current generation. Construction failures are
    /// queued as an error trigger.
    async fn attach(
        &mut self,
        signal_tx: &mpsc::UnboundedSender<PlayerSignal>,
        timer_tx: &mpsc::UnboundedSender<Trigger>,
    ) {
        if !self.page.contains(self.target.element).await {
            self.conclude(Outcome::Detached).await;
            return;
        }

        let mode = self.state.mode();
        let locator = self.sources.build(&self.target.video_id, mode);
        let generation = self.state.generation();
        let sink = PlayerEventSink::new(generation, signal_tx.clone());

        match self
            .players
            .create(self.target.element, &locator, sink)
            .await
        {
            Ok(player) => {
                self.player = Some(player);
                self.state.mark_attached();
                info!(
                    "Attached {} player to {} (generation {})",
                    mode.as_str(),
                    self.target.identity,
                    generation
                );
                self.events.emit(EmbedEvent::Attached {
                    identity: self.target.identity.clone(),
                    mode,
                    generation,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                warn!("Player creation failed on {}: {}", self.target.identity, e);
                let _ = timer_tx.send(Trigger::Error(None));
            }
        }
    }

    /// Point the element at `mode`'s host. False when the element is gone,
    /// in which case the controller has already settled as detached.
    async fn write_locator(&mut self, mode: EmbedMode) -> bool {
        let locator = self.sources.build(&self.target.video_id, mode);
        match self
            .page
            .set_attribute(self.target.element, "src", &locator)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                debug!("Cannot rewrite locator of {}: {}", self.target.identity, e);
                self.conclude(Outcome::Detached).await;
                false
            }
        }
    }

    /// Settle for reasons the state machine did not decide itself
    async fn conclude(&mut self, outcome: Outcome) {
        if self.state.force_settle(outcome) {
            self.finish(outcome).await;
        }
    }

    async fn finish(&mut self, outcome: Outcome) {
        if let Some(watchdogs) = self.watchdogs.take() {
            watchdogs.cancel();
        }
        if let Some(timer) = self.retry_timer.take() {
            timer.cancel();
        }

        match outcome {
            Outcome::Ready => {
                info!(
                    "{} ready on the {} domain",
                    self.target.identity,
                    self.state.mode().as_str()
                );
            }
            Outcome::Fallback => {
                self.destroy_player();
                warn!(
                    "{} failed on both domains, presenting link-out",
                    self.target.identity
                );
                if let Err(e) = self
                    .fallback
                    .present(self.page.as_ref(), self.target.element, &self.target.video_id)
                    .await
                {
                    warn!("Fallback for {} not shown: {}", self.target.identity, e);
                }
            }
            Outcome::Detached => {
                self.destroy_player();
                debug!("{} left the page", self.target.identity);
            }
            Outcome::Unsupervised => {}
        }

        self.events.emit(EmbedEvent::Settled {
            identity: self.target.identity.clone(),
            outcome,
            mode: self.state.mode(),
            timestamp: Utc::now(),
        });
    }

    fn destroy_player(&mut self) {
        if let Some(mut player) = self.player.take() {
            player.destroy();
        }
    }

    fn report(&self) -> EmbedReport {
        EmbedReport {
            element: self.target.element,
            identity: self.target.identity.clone(),
            video_id: self.target.video_id.clone(),
            scope: self.target.scope,
            mode: self.state.mode(),
            attempted_standard: self.state.attempted_standard(),
            outcome: self.state.outcome().unwrap_or(Outcome::Unsupervised),
        }
    }
}
