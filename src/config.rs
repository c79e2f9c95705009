use std::collections::BTreeMap;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::trigger::TriggerMode;

/// Options of one configured trigger. `mode` is shared by every backend;
/// everything else is handed to the backend's schema untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TriggerEntry {
    #[serde(default)]
    pub mode: TriggerMode,
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// `kind -> name -> entry`, e.g. `trigger.kafka.local`.
pub type TriggerEntries = BTreeMap<String, BTreeMap<String, TriggerEntry>>;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WatcherConfig {
    pub enabled: bool,
    /// Seconds between two detection cycles.
    pub interval: u64,
}

impl WatcherConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: 3600,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub trigger: TriggerEntries,
}

impl Config {
    /// Defaults, then `wud.toml`, then `wud.json`, then `WUD_*` variables
    /// using `__` between levels (`WUD_TRIGGER__KAFKA__LOCAL__BROKERS`).
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("wud.toml"))
            .merge(Json::file("wud.json"))
            .merge(Env::prefixed("WUD_").split("__"))
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::figment()
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
    }
}
