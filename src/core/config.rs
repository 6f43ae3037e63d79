//! Runtime configuration with documented defaults
//!
//! Loaded once at startup from a TOML file. Every section is optional; a
//! missing file section falls back to the defaults below, which match the
//! tuning the forcing heuristics were developed against (20 ticks per second).

use crate::core::error::{ChurnError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Ticks per real-time second on a healthy server
pub const TICKS_PER_SECOND: u64 = 20;

/// Lowest port the metrics server may bind to
pub const MIN_PORT: u16 = 1025;
/// Highest port the metrics server may bind to
pub const MAX_PORT: u16 = 32767;
/// Port used when none (or an out-of-range one) is configured
pub const DEFAULT_PORT: u16 = 1234;

/// Metrics/diagnostic HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to run the metrics server on, in `[MIN_PORT, MAX_PORT]`.
    /// Kept wide so any integer reaches `normalize` instead of failing to parse.
    pub port: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: i64::from(DEFAULT_PORT),
        }
    }
}

impl ServerConfig {
    /// Port to bind; anything `normalize` would have replaced maps to the default
    pub fn bind_port(&self) -> u16 {
        u16::try_from(self.port)
            .ok()
            .filter(|port| (MIN_PORT..=MAX_PORT).contains(port))
            .unwrap_or(DEFAULT_PORT)
    }
}

/// How the pin duration is scaled before it is applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum DurationPolicyConfig {
    /// Multiply every sampled duration by a constant
    Fixed { coefficient: f64 },
    /// Scale with how often the cell was loaded inside the age window
    LoadFrequency {
        /// Before this tick every pin gets the base coefficient
        warmup_ticks: u64,
        /// Loads needed before the coefficient starts growing
        min_loads: usize,
        /// Loads per additional 1.0 of coefficient
        loads_per_step: f64,
        /// Coefficient floor
        base: f64,
    },
}

impl Default for DurationPolicyConfig {
    fn default() -> Self {
        Self::Fixed { coefficient: 1.0 }
    }
}

/// What to do when the host reports a pinned cell as unloaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ReleasePolicyConfig {
    /// Keep the pin until its scheduled release
    Disabled,
    /// Release early once the cell has loaded at most `max_recent_loads`
    /// times inside the age window
    QuietCells { max_recent_loads: usize },
}

impl Default for ReleasePolicyConfig {
    fn default() -> Self {
        Self::Disabled
    }
}

/// Tuning for the forced-cell scheduler (all durations in ticks)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForcingConfig {
    /// Shortest time a cell stays pinned
    pub min_force_ticks: u64,
    /// Longest time a cell stays pinned
    pub max_force_ticks: u64,
    /// How far back load history is kept
    pub load_age_ticks: u64,
    /// Neighborhood radius for the occupancy gate (2 = 5x5)
    pub neighbor_radius: i32,
    /// Owner name presented to the pin facility
    pub owner: String,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
    pub duration: DurationPolicyConfig,
    pub early_release: ReleasePolicyConfig,
}

impl Default for ForcingConfig {
    fn default() -> Self {
        Self {
            min_force_ticks: 2700 * TICKS_PER_SECOND,
            max_force_ticks: 3600 * TICKS_PER_SECOND,
            load_age_ticks: 3600 * TICKS_PER_SECOND,
            neighbor_radius: 2,
            owner: "churnguard".to_string(),
            seed: None,
            duration: DurationPolicyConfig::default(),
            early_release: ReleasePolicyConfig::default(),
        }
    }
}

/// Sampling cadence of the tick reporter
///
/// Each sampler runs once per `period` server ticks, at its own offset, so
/// the expensive walks over the worlds never land on the same tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub period: u64,
    pub loaded_cells_offset: u64,
    pub players_offset: u64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            period: 60,
            loaded_cells_offset: 27,
            players_offset: 47,
        }
    }
}

/// Complete configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChurnConfig {
    pub server: ServerConfig,
    pub forcing: ForcingConfig,
    pub reporting: ReportingConfig,
}

impl ChurnConfig {
    /// Parse, normalize and validate a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: ChurnConfig = toml::from_str(contents)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load from disk; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Replace out-of-range values that have a safe default
    pub fn normalize(&mut self) {
        if !(i64::from(MIN_PORT)..=i64::from(MAX_PORT)).contains(&self.server.port) {
            tracing::warn!(
                "Port {} outside [{}, {}], falling back to {}",
                self.server.port,
                MIN_PORT,
                MAX_PORT,
                DEFAULT_PORT
            );
            self.server.port = i64::from(DEFAULT_PORT);
        }
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let forcing = &self.forcing;
        if forcing.min_force_ticks == 0 {
            return Err(ChurnError::InvalidConfig(
                "min_force_ticks must be positive".into(),
            ));
        }
        if forcing.min_force_ticks > forcing.max_force_ticks {
            return Err(ChurnError::InvalidConfig(format!(
                "min_force_ticks ({}) must be <= max_force_ticks ({})",
                forcing.min_force_ticks, forcing.max_force_ticks
            )));
        }
        if forcing.neighbor_radius < 0 {
            return Err(ChurnError::InvalidConfig(
                "neighbor_radius must not be negative".into(),
            ));
        }
        match forcing.duration {
            DurationPolicyConfig::Fixed { coefficient } => {
                if !coefficient.is_finite() || coefficient < 0.0 {
                    return Err(ChurnError::InvalidConfig(format!(
                        "duration coefficient must be finite and not negative, got {}",
                        coefficient
                    )));
                }
            }
            DurationPolicyConfig::LoadFrequency {
                loads_per_step,
                base,
                ..
            } => {
                if !loads_per_step.is_finite() || loads_per_step <= 0.0 {
                    return Err(ChurnError::InvalidConfig(format!(
                        "loads_per_step must be finite and positive, got {}",
                        loads_per_step
                    )));
                }
                if !base.is_finite() || base < 0.0 {
                    return Err(ChurnError::InvalidConfig(format!(
                        "duration base must be finite and not negative, got {}",
                        base
                    )));
                }
            }
        }

        let reporting = &self.reporting;
        if reporting.period == 0 {
            return Err(ChurnError::InvalidConfig("reporting period must be positive".into()));
        }
        if reporting.loaded_cells_offset >= reporting.period
            || reporting.players_offset >= reporting.period
        {
            return Err(ChurnError::InvalidConfig(format!(
                "reporting offsets must be below the period ({})",
                reporting.period
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ChurnConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 1234);
        assert_eq!(config.forcing.min_force_ticks, 54_000);
        assert_eq!(config.forcing.max_force_ticks, 72_000);
        assert_eq!(config.forcing.duration, DurationPolicyConfig::Fixed { coefficient: 1.0 });
        assert_eq!(config.forcing.early_release, ReleasePolicyConfig::Disabled);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ChurnConfig::from_toml("").expect("empty config should parse");
        assert_eq!(config.server.bind_port(), DEFAULT_PORT);
        assert_eq!(config.reporting.period, 60);
    }

    #[test]
    fn test_out_of_range_port_falls_back() {
        let config = ChurnConfig::from_toml("[server]\nport = 80\n").unwrap();
        assert_eq!(config.server.port, 1234);

        let config = ChurnConfig::from_toml("[server]\nport = 40000\n").unwrap();
        assert_eq!(config.server.port, 1234);

        let config = ChurnConfig::from_toml("[server]\nport = 70000\n").unwrap();
        assert_eq!(config.server.port, 1234);

        let config = ChurnConfig::from_toml("[server]\nport = -1\n").unwrap();
        assert_eq!(config.server.port, 1234);

        let config = ChurnConfig::from_toml("[server]\nport = 9100\n").unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.bind_port(), 9100);
    }

    #[test]
    fn test_policies_parse() {
        let config = ChurnConfig::from_toml(
            r#"
            [forcing]
            min_force_ticks = 100
            max_force_ticks = 200

            [forcing.duration]
            policy = "load_frequency"
            warmup_ticks = 12000
            min_loads = 5
            loads_per_step = 20.0
            base = 0.1

            [forcing.early_release]
            policy = "quiet_cells"
            max_recent_loads = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.forcing.min_force_ticks, 100);
        assert!(matches!(
            config.forcing.duration,
            DurationPolicyConfig::LoadFrequency { min_loads: 5, .. }
        ));
        assert_eq!(
            config.forcing.early_release,
            ReleasePolicyConfig::QuietCells { max_recent_loads: 1 }
        );
    }

    #[test]
    fn test_inverted_force_window_rejected() {
        let result = ChurnConfig::from_toml(
            "[forcing]\nmin_force_ticks = 500\nmax_force_ticks = 100\n",
        );
        assert!(matches!(result, Err(ChurnError::InvalidConfig(_))));
    }

    #[test]
    fn test_non_finite_coefficients_rejected() {
        for value in ["inf", "-inf", "nan", "-0.5"] {
            let result = ChurnConfig::from_toml(&format!(
                "[forcing.duration]\npolicy = \"fixed\"\ncoefficient = {}\n",
                value
            ));
            assert!(
                matches!(result, Err(ChurnError::InvalidConfig(_))),
                "coefficient {} accepted",
                value
            );
        }

        let negative_base = ChurnConfig::from_toml(
            "[forcing.duration]\npolicy = \"load_frequency\"\nwarmup_ticks = 0\nmin_loads = 5\nloads_per_step = 20.0\nbase = -1.0\n",
        );
        assert!(matches!(negative_base, Err(ChurnError::InvalidConfig(_))));

        let infinite_step = ChurnConfig::from_toml(
            "[forcing.duration]\npolicy = \"load_frequency\"\nwarmup_ticks = 0\nmin_loads = 5\nloads_per_step = inf\nbase = 0.1\n",
        );
        assert!(infinite_step.is_err());
    }

    #[test]
    fn test_offset_beyond_period_rejected() {
        let result = ChurnConfig::from_toml("[reporting]\nperiod = 10\nplayers_offset = 47\n");
        assert!(result.is_err());
    }
}
