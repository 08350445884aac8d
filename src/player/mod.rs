pub mod loader;
pub mod scripted;
pub mod traits;

pub use loader::{ApiLoader, ReadySlot, ScriptInjector, PLAYER_API_SCRIPT};
pub use scripted::{Attachment, Behavior, PlayerScript, ScriptEntry, ScriptedPlayerFactory};
pub use traits::{PlayerEvent, PlayerEventSink, PlayerFactory, PlayerHandle, PlayerSignal};
