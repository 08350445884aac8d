//! Embed lifecycle events and their persistent log

use crate::controller::{Outcome, Scope, SwitchReason};
use crate::extractor::{EmbedMode, VideoId};
use crate::page::ElementId;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, Mutex};

/// Why a discovered element was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoVideoId,
    AlreadyClaimed,
    /// Lazy container without exactly one trusted embed
    EmbedCount,
}

/// Events that describe what happened to the page's embeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EmbedEvent {
    /// An element was claimed for supervision
    Discovered {
        identity: String,
        video_id: VideoId,
        scope: Scope,
        timestamp: DateTime<Utc>,
    },
    Skipped {
        element: ElementId,
        scope: Option<Scope>,
        reason: SkipReason,
        timestamp: DateTime<Utc>,
    },
    /// A player was bound to the element
    Attached {
        identity: String,
        mode: EmbedMode,
        generation: u32,
        timestamp: DateTime<Utc>,
    },
    DomainSwitched {
        identity: String,
        reason: SwitchReason,
        /// Locator of the attachment that failed
        failed_locator: String,
        timestamp: DateTime<Utc>,
    },
    Settled {
        identity: String,
        outcome: Outcome,
        mode: EmbedMode,
        timestamp: DateTime<Utc>,
    },
    PreviewInstalled {
        container: ElementId,
        video_id: VideoId,
        timestamp: DateTime<Utc>,
    },
    PreviewActivated {
        container: ElementId,
        video_id: VideoId,
        timestamp: DateTime<Utc>,
    },
}

/// Cheap clonable fan-in for [`EmbedEvent`]s. A default sink discards everything.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<EmbedEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EmbedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: EmbedEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

/// Helper to manage the persistent event log
#[derive(Debug, Clone)]
pub struct EventLog {
    file_path: PathBuf,
    writer: Arc<Mutex<BufWriter<File>>>,
}

impl EventLog {
    pub async fn new(base_dir: &Path) -> Result<Self> {
        let file_path = base_dir.join("embed-events.jsonl");

        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .await
            .context("Failed to open event log")?;

        Ok(Self {
            file_path,
            writer: Arc::new(Mutex::new(BufWriter::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Append an event to the log
    pub async fn log(&self, event: &EmbedEvent) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let json = serde_json::to_string(event)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Log everything arriving on `rx` until every sender is gone
    pub async fn record(&self, mut rx: mpsc::UnboundedReceiver<EmbedEvent>) -> usize {
        let mut written = 0;
        while let Some(event) = rx.recv().await {
            match self.log(&event).await {
                Ok(()) => written += 1,
                Err(e) => tracing::warn!("Failed to append embed event: {}", e),
            }
        }
        written
    }

    /// Read all events back, skipping lines that do not parse
    pub async fn read_events(&self) -> Result<Vec<EmbedEvent>> {
        if !self.file_path.exists() {
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&self.file_path).await?;
        let mut events = Vec::new();

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EmbedEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!("Failed to parse event log line: {}. Error: {}", line, e);
                }
            }
        }
        Ok(events)
    }
}
