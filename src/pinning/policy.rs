//! Pluggable heuristics for how long to pin and when to let go early
//!
//! Both are selected through configuration. The defaults keep the plain
//! behavior: a fixed 1.0 duration coefficient and no early release.

use crate::core::config::{DurationPolicyConfig, ReleasePolicyConfig};
use crate::core::types::{CellCoord, Tick};

/// Scales a sampled pin duration
pub trait DurationPolicy: Send {
    /// Coefficient applied to the sampled duration. Zero means "do not pin".
    fn coefficient(&self, now: Tick, recent_loads: usize) -> f64;
}

/// Same coefficient for every pin
#[derive(Debug, Clone, Copy)]
pub struct FixedDuration {
    pub coefficient: f64,
}

impl DurationPolicy for FixedDuration {
    fn coefficient(&self, _now: Tick, _recent_loads: usize) -> f64 {
        self.coefficient
    }
}

/// Pins cells that keep reloading for longer
///
/// During warm-up, and for cells with fewer than `min_loads` recent loads,
/// the coefficient stays at `base`. Above that it grows by 1.0 for every
/// `loads_per_step` extra loads.
#[derive(Debug, Clone, Copy)]
pub struct LoadFrequencyDuration {
    pub warmup_ticks: Tick,
    pub min_loads: usize,
    pub loads_per_step: f64,
    pub base: f64,
}

impl Default for LoadFrequencyDuration {
    fn default() -> Self {
        Self {
            warmup_ticks: 600 * 20,
            min_loads: 5,
            loads_per_step: 20.0,
            base: 0.1,
        }
    }
}

impl DurationPolicy for LoadFrequencyDuration {
    fn coefficient(&self, now: Tick, recent_loads: usize) -> f64 {
        if now < self.warmup_ticks || recent_loads < self.min_loads {
            return self.base;
        }
        (recent_loads - self.min_loads) as f64 / self.loads_per_step + self.base
    }
}

/// Decides whether an unload notification ends a pin early
pub trait ReleasePolicy: Send {
    fn release_early(&self, coord: CellCoord, now: Tick, recent_loads: usize) -> bool;

    /// Disabled policies let the scheduler skip the lookup entirely
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Pins only end on schedule
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEarlyRelease;

impl ReleasePolicy for NoEarlyRelease {
    fn release_early(&self, _coord: CellCoord, _now: Tick, _recent_loads: usize) -> bool {
        false
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Releases a pinned cell once it has stopped churning
#[derive(Debug, Clone, Copy)]
pub struct QuietCellRelease {
    pub max_recent_loads: usize,
}

impl ReleasePolicy for QuietCellRelease {
    fn release_early(&self, _coord: CellCoord, _now: Tick, recent_loads: usize) -> bool {
        recent_loads <= self.max_recent_loads
    }
}

pub fn duration_policy(config: &DurationPolicyConfig) -> Box<dyn DurationPolicy> {
    match *config {
        DurationPolicyConfig::Fixed { coefficient } => Box::new(FixedDuration { coefficient }),
        DurationPolicyConfig::LoadFrequency {
            warmup_ticks,
            min_loads,
            loads_per_step,
            base,
        } => Box::new(LoadFrequencyDuration {
            warmup_ticks,
            min_loads,
            loads_per_step,
            base,
        }),
    }
}

pub fn release_policy(config: &ReleasePolicyConfig) -> Box<dyn ReleasePolicy> {
    match *config {
        ReleasePolicyConfig::Disabled => Box::new(NoEarlyRelease),
        ReleasePolicyConfig::QuietCells { max_recent_loads } => {
            Box::new(QuietCellRelease { max_recent_loads })
        }
    }
}
