use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};

pub const DEFAULT_SLOTS: usize = 5;
pub const DEFAULT_TICK_MS: u64 = 500;
pub const DEFAULT_MIN_BYTES: u64 = 1_000;
pub const DEFAULT_MAX_BYTES: u64 = 1_000_000_000_000;
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Top-level config (slotsim.toml + SLOTSIM_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Number of processing slots.
    #[serde(default = "default_slots")]
    pub slots: usize,
    /// Logical milliseconds per tick; also the driver's wall-clock period.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default)]
    pub size: SizeRangeConfig,
    #[serde(default)]
    pub jobs_per_client: JobsPerClientConfig,
    #[serde(default)]
    pub priority: PriorityConfig,
    /// Fixed RNG seed. `None` seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Capacity of the subscriber broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            slots: DEFAULT_SLOTS,
            tick_ms: DEFAULT_TICK_MS,
            size: SizeRangeConfig::default(),
            jobs_per_client: JobsPerClientConfig::default(),
            priority: PriorityConfig::default(),
            seed: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Inclusive byte range for generated job sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeRangeConfig {
    #[serde(default = "default_min_bytes")]
    pub min_bytes: u64,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

impl Default for SizeRangeConfig {
    fn default() -> Self {
        Self {
            min_bytes: DEFAULT_MIN_BYTES,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsPerClientConfig {
    #[serde(default = "default_min_jobs")]
    pub min: usize,
    #[serde(default = "default_max_jobs")]
    pub max: usize,
}

impl Default for JobsPerClientConfig {
    fn default() -> Self {
        Self {
            min: default_min_jobs(),
            max: default_max_jobs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriorityConfig {
    #[serde(default)]
    pub size_basis: SizeBasis,
}

/// What number the inverse-size priority term divides by.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SizeBasis {
    /// Raw byte count.
    #[default]
    Bytes,
    /// The bare number shown to users, ignoring the unit ("500 MB" -> 500).
    /// Matches the legacy demo, where 500 MB and 500 GB score the same.
    DisplayMagnitude,
}

fn default_slots() -> usize {
    DEFAULT_SLOTS
}
fn default_tick_ms() -> u64 {
    DEFAULT_TICK_MS
}
fn default_min_bytes() -> u64 {
    DEFAULT_MIN_BYTES
}
fn default_max_bytes() -> u64 {
    DEFAULT_MAX_BYTES
}
fn default_min_jobs() -> usize {
    1
}
fn default_max_jobs() -> usize {
    5
}
fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

impl SimConfig {
    /// Load config from a TOML file with SLOTSIM_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.slotsim/slotsim.toml
    ///
    /// A missing file is not an error; defaults fill every field.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        debug!(
            path = %path,
            exists = std::path::Path::new(&path).exists(),
            "loading config"
        );

        Self::from_figment(
            Figment::from(Serialized::defaults(SimConfig::default()))
                .merge(Toml::file(&path))
                .merge(Env::prefixed("SLOTSIM_").split("__")),
        )
    }

    /// Parse an inline TOML document on top of the defaults.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(SimConfig::default())).merge(Toml::string(toml)),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let config: SimConfig = figment
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the simulator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.slots == 0 {
            return Err(CoreError::Config("slots must be at least 1".into()));
        }
        if self.tick_ms == 0 {
            return Err(CoreError::Config("tick_ms must be at least 1".into()));
        }
        if self.size.min_bytes == 0 || self.size.min_bytes > self.size.max_bytes {
            return Err(CoreError::Config(format!(
                "invalid size range [{}, {}]",
                self.size.min_bytes, self.size.max_bytes
            )));
        }
        let jobs = &self.jobs_per_client;
        if jobs.min == 0 || jobs.min > jobs.max {
            return Err(CoreError::Config(format!(
                "invalid jobs_per_client range [{}, {}]",
                jobs.min, jobs.max
            )));
        }
        if self.event_capacity == 0 {
            return Err(CoreError::Config("event_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.slotsim/slotsim.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.slots, 5);
        assert_eq!(cfg.tick_ms, 500);
        assert_eq!(cfg.size.min_bytes, 1_000);
        assert_eq!(cfg.size.max_bytes, 1_000_000_000_000);
        assert_eq!(cfg.jobs_per_client.min, 1);
        assert_eq!(cfg.jobs_per_client.max, 5);
        assert_eq!(cfg.priority.size_basis, SizeBasis::Bytes);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let cfg = SimConfig::from_toml_str(
            r#"
            slots = 3
            seed = 42

            [priority]
            size_basis = "display_magnitude"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.slots, 3);
        assert_eq!(cfg.seed, Some(42));
        assert_eq!(cfg.priority.size_basis, SizeBasis::DisplayMagnitude);
        assert_eq!(cfg.tick_ms, DEFAULT_TICK_MS);
        assert_eq!(cfg.jobs_per_client.max, 5);
    }

    #[test]
    fn zero_slots_rejected() {
        let err = SimConfig::from_toml_str("slots = 0").unwrap_err();
        assert!(err.to_string().contains("slots"));
    }

    #[test]
    fn inverted_size_range_rejected() {
        let err = SimConfig::from_toml_str(
            r#"
            [size]
            min_bytes = 10
            max_bytes = 5
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn inverted_job_count_rejected() {
        let mut cfg = SimConfig::default();
        cfg.jobs_per_client.min = 4;
        cfg.jobs_per_client.max = 2;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overrides_file_and_splits_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "slotsim.toml",
                r#"
                slots = 3
                tick_ms = 250
                "#,
            )?;
            jail.set_env("SLOTSIM_TICK_MS", "77");
            jail.set_env("SLOTSIM_SIZE__MIN_BYTES", "4242");

            let cfg = SimConfig::load(Some("slotsim.toml")).unwrap();
            assert_eq!(cfg.slots, 3);
            assert_eq!(cfg.tick_ms, 77);
            assert_eq!(cfg.size.min_bytes, 4242);
            assert_eq!(cfg.size.max_bytes, DEFAULT_MAX_BYTES);
            Ok(())
        });
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = SimConfig::load(Some("/nonexistent/slotsim.toml")).unwrap();
        assert_eq!(cfg.slots, DEFAULT_SLOTS);
    }
}
