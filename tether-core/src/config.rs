use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tether_sync::StopPolicy;

use crate::bridge::Bridge;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    thread: ThreadConfig,
    #[serde(default)]
    bridge: BridgeConfig,
}

#[derive(Deserialize, Default)]
struct ThreadConfig {
    stop_timeout_ms: Option<u64>,
    interrupt_attempts: Option<u32>,
}

#[derive(Deserialize, Default)]
struct BridgeConfig {
    dispatch_budget: Option<usize>,
}

pub struct Config {
    thread: ThreadConfig,
    bridge: BridgeConfig,
}

impl Config {
    /// Embedded defaults, overridden by the user config file if present.
    pub fn load() -> Self {
        match user_config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::embedded(),
        }
    }

    /// Embedded defaults, overridden by `path` if it exists and parses.
    pub fn load_from(path: &Path) -> Self {
        let mut config = Self::embedded();
        if !path.exists() {
            return config;
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                Ok(user) => config.merge(user),
                Err(e) => {
                    log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                }
            },
            Err(e) => {
                log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
            }
        }
        config
    }

    /// Embedded defaults overridden by `contents`.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let user = toml::from_str::<ConfigFile>(contents)?;
        let mut config = Self::embedded();
        config.merge(user);
        Ok(config)
    }

    fn embedded() -> Self {
        let base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        Config {
            thread: base.thread,
            bridge: base.bridge,
        }
    }

    fn merge(&mut self, user: ConfigFile) {
        if user.thread.stop_timeout_ms.is_some() {
            self.thread.stop_timeout_ms = user.thread.stop_timeout_ms;
        }
        if user.thread.interrupt_attempts.is_some() {
            self.thread.interrupt_attempts = user.thread.interrupt_attempts;
        }
        if user.bridge.dispatch_budget.is_some() {
            self.bridge.dispatch_budget = user.bridge.dispatch_budget;
        }
    }

    /// Cooperative stop budget (clamped to 10ms..=10min).
    pub fn stop_timeout(&self) -> Duration {
        let ms = self
            .thread
            .stop_timeout_ms
            .unwrap_or(1000)
            .clamp(10, 600_000);
        Duration::from_millis(ms)
    }

    /// Interrupts sent before abandoning a thread (clamped to 0..=64).
    pub fn interrupt_attempts(&self) -> u32 {
        self.thread.interrupt_attempts.unwrap_or(8).min(64)
    }

    /// Handler runs per bridge pump (clamped to 1..=4096).
    pub fn dispatch_budget(&self) -> usize {
        self.bridge.dispatch_budget.unwrap_or(64).clamp(1, 4096)
    }

    pub fn stop_policy(&self) -> StopPolicy {
        StopPolicy {
            timeout: self.stop_timeout(),
            interrupt_attempts: self.interrupt_attempts(),
        }
    }

    /// A bridge owned by the calling thread with the configured budget.
    pub fn bridge(&self) -> Bridge {
        Bridge::with_budget(self.dispatch_budget())
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tether").join("config.toml"))
}
