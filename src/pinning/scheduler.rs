//! Forced-cell scheduler
//!
//! Decides which observed cells get pinned and for how long, and makes sure
//! every acquired ticket is handed back exactly once.
//!
//! Per cell the state is either unpinned or pinned. A cell becomes pinned in
//! `observe` and unpinned again when its release comes due (drained at the
//! start of every observation and at the end of every server tick) or, when
//! the release policy allows it, on an unload notification.
//!
//! The ledger and the release schedule always hold the same set of cells
//! with the same release ticks; both are updated together.

use crate::core::config::ForcingConfig;
use crate::core::types::{CellCoord, Tick};
use crate::host::{CellListener, PinFacility};
use crate::metrics::Metrics;
use crate::pinning::history::LoadHistory;
use crate::pinning::ledger::{PinLedger, PinRecord};
use crate::pinning::occupancy::OccupancyIndex;
use crate::pinning::policy::{self, DurationPolicy, ReleasePolicy};
use crate::pinning::schedule::ReleaseSchedule;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

/// How often stale load histories are swept (ticks)
const HISTORY_SWEEP_INTERVAL: Tick = 1200;

/// Outcome of one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinDecision {
    /// Cell was already pinned by us
    AlreadyPinned,
    /// Another owner holds the cell
    ExternallyPinned,
    /// Empty cell with no occupied neighbor
    NotWorthProtecting,
    /// Duration policy scaled the pin to nothing
    ZeroDuration,
    /// The facility refused a ticket
    TicketRefused,
    Pinned { release_at: Tick },
}

pub struct ForcedCellScheduler<F: PinFacility> {
    owner: String,
    min_force_ticks: Tick,
    max_force_ticks: Tick,
    facility: F,
    ledger: Arc<PinLedger>,
    schedule: ReleaseSchedule,
    history: LoadHistory,
    occupancy: OccupancyIndex,
    duration_policy: Box<dyn DurationPolicy>,
    release_policy: Box<dyn ReleasePolicy>,
    rng: ChaCha8Rng,
    metrics: Metrics,
    last_sweep: Tick,
}

impl<F: PinFacility> ForcedCellScheduler<F> {
    /// Build a scheduler from `config`.
    ///
    /// `ChurnConfig::validate` is expected to have run; an inverted force
    /// window is still tolerated here by swapping its bounds.
    pub fn new(
        config: &ForcingConfig,
        facility: F,
        ledger: Arc<PinLedger>,
        metrics: Metrics,
    ) -> Self {
        let (min_force_ticks, max_force_ticks) = if config.min_force_ticks <= config.max_force_ticks {
            (config.min_force_ticks, config.max_force_ticks)
        } else {
            tracing::warn!(
                "Force window {}..={} is inverted, using {}..={}",
                config.min_force_ticks,
                config.max_force_ticks,
                config.max_force_ticks,
                config.min_force_ticks
            );
            (config.max_force_ticks, config.min_force_ticks)
        };
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            owner: config.owner.clone(),
            min_force_ticks,
            max_force_ticks,
            facility,
            ledger,
            schedule: ReleaseSchedule::new(),
            history: LoadHistory::new(config.load_age_ticks),
            occupancy: OccupancyIndex::new(config.neighbor_radius),
            duration_policy: policy::duration_policy(&config.duration),
            release_policy: policy::release_policy(&config.early_release),
            rng,
            metrics,
            last_sweep: 0,
        }
    }

    /// Replace the configured duration policy
    pub fn with_duration_policy(mut self, policy: Box<dyn DurationPolicy>) -> Self {
        self.duration_policy = policy;
        self
    }

    /// Replace the configured early-release policy
    pub fn with_release_policy(mut self, policy: Box<dyn ReleasePolicy>) -> Self {
        self.release_policy = policy;
        self
    }

    /// Handle a loaded cell: release what is due, then maybe pin `coord`
    pub fn observe(&mut self, coord: CellCoord, now: Tick, occupants: usize) -> PinDecision {
        self.drain_due(now);

        if self.ledger.contains(&coord) {
            return PinDecision::AlreadyPinned;
        }
        if self.facility.is_externally_pinned(coord) {
            return PinDecision::ExternallyPinned;
        }

        self.occupancy.record(coord, occupants);
        if occupants == 0 && !self.occupancy.has_significant_neighbor(&coord) {
            return PinDecision::NotWorthProtecting;
        }

        let recent_loads = self.history.record(coord, now);
        let coefficient = self.duration_policy.coefficient(now, recent_loads);
        let sampled = self.rng.gen_range(self.min_force_ticks..=self.max_force_ticks);
        // `as` maps NaN and negatives to zero and saturates at Tick::MAX
        let duration = (coefficient * sampled as f64) as Tick;
        if duration == 0 {
            return PinDecision::ZeroDuration;
        }
        let release_at = now.saturating_add(duration);

        self.metrics.pin_attempts.inc();
        let ticket = match self.facility.request_pin(&self.owner, coord) {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::warn!("Failed to force cell {}: {}", coord, e);
                self.metrics.pin_failures.inc();
                return PinDecision::TicketRefused;
            }
        };
        self.facility.force_pin(&ticket, coord);

        let record = PinRecord {
            coord,
            ticket,
            release_at,
        };
        if let Err(rejected) = self.ledger.insert(record) {
            tracing::error!("Cell {} was pinned twice, returning the new ticket", coord);
            self.facility.release_pin(rejected.ticket);
            return PinDecision::AlreadyPinned;
        }
        self.schedule.push(coord, release_at);
        self.metrics.pinned.inc();
        self.metrics.pins.inc();
        tracing::debug!(
            "Pinned {} until tick {} ({} recent loads)",
            coord,
            release_at,
            recent_loads
        );

        PinDecision::Pinned { release_at }
    }

    /// Handle an unloaded cell. Only acts when the release policy is enabled.
    ///
    /// Returns true if a pin was released early.
    pub fn release(&mut self, coord: CellCoord, now: Tick) -> bool {
        if !self.release_policy.is_enabled() || !self.ledger.contains(&coord) {
            return false;
        }
        let recent_loads = self.history.count_within(&coord, now);
        if !self.release_policy.release_early(coord, now, recent_loads) {
            return false;
        }

        self.schedule.cancel(&coord);
        match self.ledger.remove(&coord) {
            Some(record) => {
                tracing::debug!("Released {} early at tick {}", coord, now);
                self.return_ticket(record);
                true
            }
            None => false,
        }
    }

    /// Release every pin due at `now`. Returns how many were released.
    pub fn drain_due(&mut self, now: Tick) -> usize {
        let mut released = 0;
        while let Some(due) = self.schedule.pop_due(now) {
            match self.ledger.remove(&due.coord) {
                Some(record) => {
                    if record.release_at != due.release_at {
                        tracing::error!(
                            "Release tick mismatch for {}: ledger {} schedule {}",
                            due.coord,
                            record.release_at,
                            due.release_at
                        );
                    }
                    self.return_ticket(record);
                    released += 1;
                }
                None => {
                    tracing::error!("Scheduled release for {} has no ledger record", due.coord);
                }
            }
        }
        released
    }

    /// Periodic housekeeping without an observation
    pub fn tick(&mut self, now: Tick) -> usize {
        let released = self.drain_due(now);
        if now.saturating_sub(self.last_sweep) >= HISTORY_SWEEP_INTERVAL {
            let forgotten = self.history.forget_stale(now);
            if forgotten > 0 {
                tracing::debug!("Forgot load history of {} quiet cells", forgotten);
            }
            self.last_sweep = now;
        }
        released
    }

    /// Release every outstanding pin, e.g. on shutdown
    pub fn release_all(&mut self) -> usize {
        self.schedule.clear();
        let records = self.ledger.drain();
        let count = records.len();
        for record in records {
            self.return_ticket(record);
        }
        if count > 0 {
            tracing::info!("Released all {} pinned cells", count);
        }
        count
    }

    fn return_ticket(&mut self, record: PinRecord) {
        self.facility.release_pin(record.ticket);
        self.metrics.pinned.dec();
        self.metrics.releases.inc();
    }

    /// True when the ledger and the schedule agree cell for cell
    pub fn is_consistent(&self) -> bool {
        self.schedule.len() == self.ledger.len()
            && self.schedule.entries().all(|entry| {
                self.ledger
                    .get(&entry.coord)
                    .is_some_and(|pinned| pinned.release_at == entry.release_at)
            })
    }

    pub fn ledger(&self) -> &Arc<PinLedger> {
        &self.ledger
    }

    pub fn schedule(&self) -> &ReleaseSchedule {
        &self.schedule
    }

    pub fn history(&self) -> &LoadHistory {
        &self.history
    }

    pub fn occupancy(&self) -> &OccupancyIndex {
        &self.occupancy
    }

    pub fn facility(&self) -> &F {
        &self.facility
    }

    pub fn facility_mut(&mut self) -> &mut F {
        &mut self.facility
    }

    pub fn force_window(&self) -> (Tick, Tick) {
        (self.min_force_ticks, self.max_force_ticks)
    }
}

impl<F: PinFacility> CellListener for ForcedCellScheduler<F> {
    fn on_cell_observed(&mut self, coord: CellCoord, now: Tick, occupants: usize) {
        self.observe(coord, now, occupants);
    }

    fn on_cell_released(&mut self, coord: CellCoord, now: Tick) {
        self.release(coord, now);
    }

    fn on_server_tick(&mut self, now: Tick) {
        self.tick(now);
    }
}
