//! Player double driven by a declarative script
//!
//! Used by the headless CLI and by tests: each attachment looks up how the
//! player for that video and host should behave, then plays it out on the
//! tokio clock.

use crate::extractor::EmbedMode;
use crate::page::ElementId;
use crate::player::traits::{PlayerEvent, PlayerEventSink, PlayerFactory, PlayerHandle};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// How one player attachment behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Behavior {
    Ready {
        #[serde(default)]
        after_ms: u64,
    },
    Error {
        code: i32,
        #[serde(default)]
        after_ms: u64,
    },
    /// Never reports anything
    Silent,
    /// Player construction itself fails
    Reject,
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior::Ready { after_ms: 0 }
    }
}

/// Behaviour override for one video, optionally limited to one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptEntry {
    pub video_id: String,
    #[serde(default)]
    pub mode: Option<EmbedMode>,
    pub behavior: Behavior,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerScript {
    #[serde(default)]
    pub default: Behavior,
    #[serde(default)]
    pub overrides: Vec<ScriptEntry>,
}

impl PlayerScript {
    pub fn new(default: Behavior) -> Self {
        Self {
            default,
            overrides: Vec::new(),
        }
    }

    pub fn with(mut self, video_id: &str, mode: Option<EmbedMode>, behavior: Behavior) -> Self {
        self.overrides.push(ScriptEntry {
            video_id: video_id.to_string(),
            mode,
            behavior,
        });
        self
    }

    /// Most specific match wins: id + mode, then id, then the default
    pub fn behavior_for(&self, locator: &str) -> Behavior {
        let mode = EmbedMode::of_locator(locator);
        let for_video: Vec<&ScriptEntry> = self
            .overrides
            .iter()
            .filter(|e| locator.contains(&format!("/embed/{}", e.video_id)))
            .collect();

        for_video
            .iter()
            .find(|e| e.mode == Some(mode))
            .or_else(|| for_video.iter().find(|e| e.mode.is_none()))
            .map(|e| e.behavior)
            .unwrap_or(self.default)
    }
}

/// One call to [`PlayerFactory::create`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub element: ElementId,
    pub locator: String,
    pub mode: EmbedMode,
    pub generation: u32,
}

pub struct ScriptedPlayerFactory {
    script: PlayerScript,
    attachments: Arc<Mutex<Vec<Attachment>>>,
    destroyed: Arc<AtomicUsize>,
}

impl ScriptedPlayerFactory {
    pub fn new(script: PlayerScript) -> Self {
        Self {
            script,
            attachments: Arc::new(Mutex::new(Vec::new())),
            destroyed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn attachments(&self) -> Vec<Attachment> {
        self.attachments.lock().await.clone()
    }

    pub async fn attachments_for(&self, element: ElementId) -> Vec<Attachment> {
        self.attachments
            .lock()
            .await
            .iter()
            .filter(|a| a.element == element)
            .cloned()
            .collect()
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

struct ScriptedPlayer {
    task: Option<JoinHandle<()>>,
    destroyed: Arc<AtomicUsize>,
}

impl PlayerHandle for ScriptedPlayer {
    fn destroy(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PlayerFactory for ScriptedPlayerFactory {
    async fn create(
        &self,
        element: ElementId,
        locator: &str,
        sink: PlayerEventSink,
    ) -> Result<Box<dyn PlayerHandle>> {
        self.attachments.lock().await.push(Attachment {
            element,
            locator: locator.to_string(),
            mode: EmbedMode::of_locator(locator),
            generation: sink.generation(),
        });

        let behavior = self.script.behavior_for(locator);
        debug!("Scripted player on {} behaves as {:?}", element, behavior);

        let (event, after_ms) = match behavior {
            Behavior::Reject => return Err(anyhow!("player construction rejected for {}", locator)),
            Behavior::Silent => (None, 0),
            Behavior::Ready { after_ms } => (Some(PlayerEvent::Ready), after_ms),
            Behavior::Error { code, after_ms } => (Some(PlayerEvent::Error(code)), after_ms),
        };

        let task = event.map(|event| {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(after_ms)).await;
                sink.emit(event);
            })
        });

        Ok(Box::new(ScriptedPlayer {
            task,
            destroyed: self.destroyed.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PE: &str = "https://www.youtube-nocookie.com/embed/abc123XYZ?rel=0";
    const STD: &str = "https://www.youtube.com/embed/abc123XYZ?rel=0";

    #[test]
    fn most_specific_override_wins() {
        let script = PlayerScript::new(Behavior::Silent)
            .with("abc123XYZ", None, Behavior::Error { code: 150, after_ms: 0 })
            .with("abc123XYZ", Some(EmbedMode::Standard), Behavior::Ready { after_ms: 5 });

        assert_eq!(
            script.behavior_for(PE),
            Behavior::Error { code: 150, after_ms: 0 }
        );
        assert_eq!(script.behavior_for(STD), Behavior::Ready { after_ms: 5 });
        assert_eq!(
            script.behavior_for("https://www.youtube.com/embed/other00"),
            Behavior::Silent
        );
    }

    #[test]
    fn script_parses_from_json() {
        let script: PlayerScript = serde_json::from_str(
            r#"{
                "default": { "kind": "silent" },
                "overrides": [
                    { "video_id": "abc123XYZ", "mode": "privacy_enhanced", "behavior": { "kind": "error", "code": 150 } }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(script.default, Behavior::Silent);
        assert_eq!(
            script.behavior_for(PE),
            Behavior::Error { code: 150, after_ms: 0 }
        );
    }

    #[tokio::test]
    async fn emits_scripted_event_with_generation() {
        let factory = ScriptedPlayerFactory::new(PlayerScript::default());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _player = factory
            .create(ElementId(7), PE, PlayerEventSink::new(3, tx))
            .await
            .unwrap();

        let signal = rx.recv().await.unwrap();
        assert_eq!(signal.generation, 3);
        assert_eq!(signal.event, PlayerEvent::Ready);
        assert_eq!(factory.attachments().await[0].mode, EmbedMode::PrivacyEnhanced);
    }

    #[tokio::test(start_paused = true)]
    async fn destroyed_player_stays_quiet() {
        let factory = ScriptedPlayerFactory::new(PlayerScript::new(Behavior::Ready { after_ms: 100 }));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut player = factory
            .create(ElementId(1), STD, PlayerEventSink::new(1, tx))
            .await
            .unwrap();
        player.destroy();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(factory.destroyed(), 1);
    }
}
