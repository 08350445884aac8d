use crate::page::ElementId;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events an embedded player reports back to its supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerEvent {
    Ready,
    /// Player error code, e.g. 101/150 when embedding is disallowed
    Error(i32),
}

/// A [`PlayerEvent`] tagged with the attachment it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSignal {
    pub generation: u32,
    pub event: PlayerEvent,
}

/// Where a player delivers its events
///
/// Each attachment gets its own sink; signals from a player that has since
/// been replaced carry a stale generation and are dropped by the controller.
#[derive(Debug, Clone)]
pub struct PlayerEventSink {
    generation: u32,
    tx: mpsc::UnboundedSender<PlayerSignal>,
}

impl PlayerEventSink {
    pub fn new(generation: u32, tx: mpsc::UnboundedSender<PlayerSignal>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Returns false once the supervisor has gone away
    pub fn emit(&self, event: PlayerEvent) -> bool {
        self.tx
            .send(PlayerSignal {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// A live player bound to one element
pub trait PlayerHandle: Send {
    /// Tear the player down; no further events may be emitted
    fn destroy(&mut self);
}

/// Creates players on top of embed elements
#[async_trait]
pub trait PlayerFactory: Send + Sync {
    /// Bind a player to `element`, which already carries `locator` as its source.
    ///
    /// An error here is handled like a player error event.
    async fn create(
        &self,
        element: ElementId,
        locator: &str,
        sink: PlayerEventSink,
    ) -> Result<Box<dyn PlayerHandle>>;
}
