use anyhow::{Context, Result};
use duplex::client::TransportConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:3000/ws";

/// Settings read from `duplex.toml`; every field may be omitted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub relay_url: String,
    pub display_name: String,
    /// Fixed peer id; a random one is generated when unset.
    pub peer_id: Option<String>,
    pub transport: TransportConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_owned(),
            display_name: std::env::var("USER").unwrap_or_else(|_| "anonymous".to_owned()),
            peer_id: None,
            transport: TransportConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
