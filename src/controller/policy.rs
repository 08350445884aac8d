use crate::utils::config::EmbedSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which set of elements a controller instance supervises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Iframes explicitly marked as video embeds. Error-driven only.
    Trusted,
    /// Every iframe whose locator points at a known video host. Adds watchdogs.
    PageWide,
}

impl Scope {
    pub fn policy(&self, settings: &EmbedSettings) -> ControllerPolicy {
        let watchdogs = match self {
            Scope::Trusted => None,
            Scope::PageWide => Some((settings.short_watchdog(), settings.long_watchdog())),
        };
        ControllerPolicy {
            watchdogs,
            retry_delay: settings.retry_delay(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Trusted => "trusted",
            Scope::PageWide => "page-wide",
        }
    }
}

/// Timing parameters of one controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerPolicy {
    /// (short, long) watchdog delays; `None` disables both
    pub watchdogs: Option<(Duration, Duration)>,
    pub retry_delay: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_page_wide_scope_arms_watchdogs() {
        let settings = EmbedSettings::default();
        assert_eq!(Scope::Trusted.policy(&settings).watchdogs, None);
        assert_eq!(
            Scope::PageWide.policy(&settings).watchdogs,
            Some((Duration::from_millis(2_500), Duration::from_millis(5_000)))
        );
        assert_eq!(
            Scope::Trusted.policy(&settings).retry_delay,
            Duration::from_millis(120)
        );
    }
}
