//! Configuration and error types

pub mod config;
pub mod error;

// Re-export for convenience
pub use config::{default_config_path, EmbedSettings};
pub use error::EmbedError;
