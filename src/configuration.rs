use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

const CONFIG_FILE: &str = "config.toml";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub router: RouterSettings,
    #[serde(default)]
    pub subscriptions: Option<SubscriptionSettings>,
    #[serde(default)]
    pub storage: Option<StorageSettings>,
    #[serde(default)]
    pub fleet: Option<FleetSettings>,
    #[serde(default)]
    pub trace: Option<TraceSettings>,
}

#[derive(Debug, Deserialize)]
pub struct RouterSettings {
    /// host:port of the admin interface.
    pub addr: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionSettings {
    pub urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StorageSettings {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct FleetSettings {
    pub inventory: String,
}

#[derive(Debug, Deserialize)]
pub struct TraceSettings {
    pub url: String,
}

impl Settings {
    pub fn new() -> Result<Self> {
        Self::from_file(CONFIG_FILE)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("cannot read {path}"))?;
        toml::from_str(&raw).with_context(|| format!("cannot parse {path}"))
    }
}

impl RouterSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}
