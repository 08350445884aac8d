//! Embed supervision settings

use crate::utils::error::EmbedError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings shared by the lazy stage and both supervision scopes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedSettings {
    /// Class that marks an iframe as a trusted embed
    pub trusted_marker: String,

    /// Class of the wrapper replaced by the fallback link-out
    pub container_class: String,

    /// Class of containers whose embed is deferred until clicked
    pub lazy_container: String,

    /// Hosts recognised by the page-wide scan
    pub video_hosts: Vec<String>,

    /// First watchdog: forces the domain switch (milliseconds)
    pub short_watchdog_ms: u64,

    /// Second watchdog: forces the fallback (milliseconds)
    pub long_watchdog_ms: u64,

    /// Pause between a domain switch and the new player (milliseconds)
    pub retry_delay_ms: u64,

    pub fallback_message: String,
    pub fallback_link_label: String,
    pub play_label: String,
}

impl Default for EmbedSettings {
    fn default() -> Self {
        Self {
            trusted_marker: "js-video-embed".to_string(),
            container_class: "video-embed".to_string(),
            lazy_container: "video-lazy".to_string(),
            video_hosts: vec![
                "youtube.com".to_string(),
                "youtube-nocookie.com".to_string(),
            ],
            short_watchdog_ms: 2_500,
            long_watchdog_ms: 5_000,
            retry_delay_ms: 120,
            fallback_message: "This video can't be played here.".to_string(),
            fallback_link_label: "Watch on YouTube".to_string(),
            play_label: "Play video".to_string(),
        }
    }
}

impl EmbedSettings {
    /// Read settings from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(EmbedError::from)?;
        let settings: Self = serde_json::from_str(&raw).map_err(EmbedError::from)?;
        settings.sanitized()
    }

    /// Load from the default location, falling back to built-in defaults
    pub fn load_or_default() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Enforce sane minimums
    pub fn sanitized(mut self) -> Result<Self> {
        self.video_hosts.retain(|h| !h.trim().is_empty());
        if self.video_hosts.is_empty() {
            return Err(EmbedError::Config("video_hosts must not be empty".to_string()).into());
        }
        if self.short_watchdog_ms == 0 {
            self.short_watchdog_ms = 1;
        }
        if self.long_watchdog_ms <= self.short_watchdog_ms {
            return Err(EmbedError::Config(format!(
                "long_watchdog_ms ({}) must exceed short_watchdog_ms ({})",
                self.long_watchdog_ms, self.short_watchdog_ms
            ))
            .into());
        }
        Ok(self)
    }

    pub fn short_watchdog(&self) -> Duration {
        Duration::from_millis(self.short_watchdog_ms)
    }

    pub fn long_watchdog(&self) -> Duration {
        Duration::from_millis(self.long_watchdog_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// `<config dir>/embedguard/settings.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("embedguard").join("settings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbedSettings::default();
        assert_eq!(config.short_watchdog(), Duration::from_millis(2_500));
        assert_eq!(config.long_watchdog(), Duration::from_secs(5));
        assert_eq!(config.retry_delay(), Duration::from_millis(120));
        assert!(config.clone().sanitized().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EmbedSettings =
            serde_json::from_str(r#"{ "retry_delay_ms": 50, "trusted_marker": "yt" }"#).unwrap();
        assert_eq!(config.retry_delay_ms, 50);
        assert_eq!(config.trusted_marker, "yt");
        assert_eq!(config.long_watchdog_ms, 5_000);
    }

    #[test]
    fn test_watchdog_order_is_enforced() {
        let config = EmbedSettings {
            short_watchdog_ms: 5_000,
            long_watchdog_ms: 2_500,
            ..Default::default()
        };
        assert!(config.sanitized().is_err());
    }

    #[test]
    fn test_blank_hosts_rejected() {
        let config = EmbedSettings {
            video_hosts: vec!["  ".to_string()],
            ..Default::default()
        };
        assert!(config.sanitized().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "short_watchdog_ms": 1000, "long_watchdog_ms": 3000 }"#)
            .unwrap();
        let config = EmbedSettings::load(&path).unwrap();
        assert_eq!(config.short_watchdog(), Duration::from_secs(1));
        assert_eq!(config.long_watchdog(), Duration::from_secs(3));
    }
}
