//! Page fixtures for headless runs

use crate::page::{Markup, MemoryPage};
use crate::player::PlayerScript;
use crate::utils::error::EmbedError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// A page plus the way its players should behave
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFixture {
    pub url: String,
    #[serde(default)]
    pub body: Vec<Markup>,
    #[serde(default)]
    pub players: PlayerScript,
}

impl PageFixture {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(EmbedError::from)?;
        Ok(serde_json::from_str(&raw).map_err(EmbedError::from)?)
    }

    /// Build the in-memory page; the player script is returned alongside
    pub fn into_page(self) -> Result<(MemoryPage, PlayerScript)> {
        let url = Url::parse(&self.url).map_err(EmbedError::from)?;
        Ok((MemoryPage::with_body(url, self.body), self.players))
    }
}
