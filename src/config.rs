//! Runtime configuration loaded from environment variables.
//!
//! Every knob has a typed default; unparseable values fall back to it.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LIVE_SAVE_DEBOUNCE_MS: u64 = 450;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Whether zone deletion writes a tombstone or removes the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoftDeleteMode {
    /// Try soft-delete; switch to hard-delete once the schema reports the
    /// tombstone columns missing.
    #[default]
    Auto,
    /// Always soft-delete. A missing column is a hard error.
    On,
    /// Always hard-delete.
    Off,
}

impl FromStr for SoftDeleteMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "on" | "true" | "1" => Ok(Self::On),
            "off" | "false" | "0" => Ok(Self::Off),
            other => Err(format!("unknown soft-delete mode: {other}")),
        }
    }
}

/// Autosave and trash tuning shared by every map session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Quiet period after the last zone edit before a live save fires.
    pub live_save_debounce: Duration,
    /// Period of the dirty-state sweep.
    pub sweep_interval: Duration,
    pub soft_delete: SoftDeleteMode,
    pub db_max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            live_save_debounce: Duration::from_millis(DEFAULT_LIVE_SAVE_DEBOUNCE_MS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            soft_delete: SoftDeleteMode::Auto,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
        }
    }
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        let soft_delete = std::env::var("ZONEMAP_SOFT_DELETE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        Self {
            live_save_debounce: Duration::from_millis(env_parse(
                "ZONEMAP_LIVE_SAVE_DEBOUNCE_MS",
                DEFAULT_LIVE_SAVE_DEBOUNCE_MS,
            )),
            sweep_interval: Duration::from_secs(
                env_parse("ZONEMAP_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS).max(1),
            ),
            soft_delete,
            db_max_connections: env_parse("ZONEMAP_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS).max(1),
        }
    }
}
