//! embedguard library
//!
//! Video embed supervision for marketing pages: locator normalization,
//! single domain-fallback retry, watchdog timers, link-out fallback and
//! click-to-load previews.

pub mod controller;
pub mod events;
pub mod extractor;
pub mod fixture;
pub mod page;
pub mod player;
pub mod presenter;
pub mod utils;

// Re-export main types for easier use
pub use controller::{ControllerTask, EmbedReport, EmbedSupervisor, Outcome, PageRun, Scope, Settlement};
pub use events::{EmbedEvent, EventLog, EventSink};
pub use extractor::{EmbedMode, SourceBuilder, VideoId, VideoIdExtractor};
pub use page::{ElementId, Markup, MemoryPage, Page, Query};
pub use player::{ApiLoader, PlayerFactory, ScriptedPlayerFactory};
pub use presenter::{FallbackPresenter, LazyReveal};
pub use utils::{EmbedError, EmbedSettings};
