//! Per-element controller state and its transition rules
//!
//! [`ControllerState::apply`] decides; the controller task carries out the
//! returned [`Action`]. Keeping the decision pure means every rule below can
//! be checked without a page, a player or a clock.

use crate::extractor::EmbedMode;
use serde::{Deserialize, Serialize};

/// Something that happened to a supervised element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Ready,
    /// Player error; `None` when the player could not even be created
    Error(Option<i32>),
    ShortWatchdog,
    LongWatchdog,
    /// The post-switch delay has elapsed
    RebindDue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchReason {
    PlayerError(Option<i32>),
    Watchdog,
}

/// Terminal result of supervising one element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ready,
    Fallback,
    /// The element left the page while supervised
    Detached,
    /// The player API never became available
    Unsupervised,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Ignore,
    SwitchToStandard(SwitchReason),
    Rebind,
    Settle(Outcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Normalizing,
    Attached(EmbedMode),
    Retrying,
    Settled(Outcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    mode: EmbedMode,
    attempted_standard: bool,
    settled: bool,
    retrying: bool,
    attached: bool,
    generation: u32,
    outcome: Option<Outcome>,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerState {
    pub fn new() -> Self {
        Self {
            mode: EmbedMode::PrivacyEnhanced,
            attempted_standard: false,
            settled: false,
            retrying: false,
            attached: false,
            generation: 1,
            outcome: None,
        }
    }

    pub fn mode(&self) -> EmbedMode {
        self.mode
    }

    pub fn attempted_standard(&self) -> bool {
        self.attempted_standard
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub fn is_retrying(&self) -> bool {
        self.retrying
    }

    /// Attachment whose player events are currently accepted
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn phase(&self) -> Phase {
        match self.outcome {
            Some(outcome) => Phase::Settled(outcome),
            None if self.retrying => Phase::Retrying,
            None if self.attached => Phase::Attached(self.mode),
            None => Phase::Normalizing,
        }
    }

    /// A player has been bound for the current generation
    pub fn mark_attached(&mut self) {
        if !self.settled {
            self.attached = true;
        }
    }

    /// Decide how to react to `trigger`
    pub fn apply(&mut self, trigger: Trigger) -> Action {
        if self.settled {
            return Action::Ignore;
        }

        match trigger {
            Trigger::Ready if !self.retrying => self.settle(Outcome::Ready),
            Trigger::Error(code) if !self.retrying => {
                if self.attempted_standard {
                    self.settle(Outcome::Fallback)
                } else {
                    self.begin_switch(SwitchReason::PlayerError(code))
                }
            }
            Trigger::ShortWatchdog if !self.retrying && !self.attempted_standard => {
                self.begin_switch(SwitchReason::Watchdog)
            }
            Trigger::LongWatchdog => self.settle(Outcome::Fallback),
            Trigger::RebindDue if self.retrying => {
                self.retrying = false;
                self.attached = false;
                Action::Rebind
            }
            _ => Action::Ignore,
        }
    }

    /// Settle for reasons outside the player contract (element gone, no API).
    /// Returns false when already settled.
    pub fn force_settle(&mut self, outcome: Outcome) -> bool {
        !self.settled && matches!(self.settle(outcome), Action::Settle(_))
    }

    fn begin_switch(&mut self, reason: SwitchReason) -> Action {
        self.mode = EmbedMode::Standard;
        self.attempted_standard = true;
        self.retrying = true;
        self.generation += 1;
        Action::SwitchToStandard(reason)
    }

    fn settle(&mut self, outcome: Outcome) -> Action {
        self.settled = true;
        self.retrying = false;
        self.outcome = Some(outcome);
        Action::Settle(outcome)
    }
}
