//! Tick reporter - samples host state into the registry
//!
//! Driven by server and world tick notifications. Tick timing is measured
//! between the start and end phases; the heavier world walks run once per
//! reporting period at fixed offsets.

use crate::core::config::ReportingConfig;
use crate::core::types::WorldId;
use crate::host::{HostView, TickPhase};
use crate::metrics::{Metrics, CAUSE_CHURN, CAUSE_EXTERNAL, CAUSE_OTHER};
use crate::pinning::PinLedger;
use ahash::{AHashMap, AHashSet};
use prometheus::HistogramTimer;
use std::sync::Arc;

pub struct TickReporter {
    config: ReportingConfig,
    metrics: Metrics,
    ledger: Arc<PinLedger>,
    server_ticks: u64,
    server_timer: Option<HistogramTimer>,
    world_timers: AHashMap<WorldId, HistogramTimer>,
    seen_players: AHashSet<String>,
}

impl TickReporter {
    pub fn new(config: ReportingConfig, metrics: Metrics, ledger: Arc<PinLedger>) -> Self {
        Self {
            config,
            metrics,
            ledger,
            server_ticks: 0,
            server_timer: None,
            world_timers: AHashMap::new(),
            seen_players: AHashSet::new(),
        }
    }

    pub fn server_ticks(&self) -> u64 {
        self.server_ticks
    }

    pub fn on_server_tick(&mut self, phase: TickPhase, host: &dyn HostView) {
        match phase {
            TickPhase::Start => {
                self.server_ticks += 1;
                // A start without a matching end is not a tick duration
                let timer = self.metrics.tick_time.start_timer();
                if let Some(stale) = self.server_timer.replace(timer) {
                    stale.stop_and_discard();
                }

                let slot = self.server_ticks % self.config.period;
                if slot == self.config.loaded_cells_offset {
                    self.sample_loaded_cells(host);
                }
                if slot == self.config.players_offset {
                    self.sample_players(host);
                }
            }
            TickPhase::End => {
                if let Some(timer) = self.server_timer.take() {
                    timer.observe_duration();
                }
                self.metrics.ticks.inc();
            }
        }
    }

    pub fn on_world_tick(&mut self, world: WorldId, name: &str, phase: TickPhase) {
        match phase {
            TickPhase::Start => {
                let timer = self.metrics.world_time.with_label_values(&[name]).start_timer();
                if let Some(stale) = self.world_timers.insert(world, timer) {
                    stale.stop_and_discard();
                }
            }
            TickPhase::End => {
                if let Some(timer) = self.world_timers.remove(&world) {
                    timer.observe_duration();
                }
            }
        }
    }

    /// Split every world's loaded cells by what keeps them loaded
    pub fn sample_loaded_cells(&self, host: &dyn HostView) {
        for world in host.worlds() {
            let ours = self.ledger.pinned_in(world.id);
            let by_others = world.forced_cells.saturating_sub(ours);
            let other = world.loaded_cells.saturating_sub(world.forced_cells);

            let loaded = &self.metrics.chunks_loaded;
            loaded
                .with_label_values(&[CAUSE_EXTERNAL, &world.name])
                .set(by_others as i64);
            loaded
                .with_label_values(&[CAUSE_CHURN, &world.name])
                .set(ours as i64);
            loaded
                .with_label_values(&[CAUSE_OTHER, &world.name])
                .set(other as i64);
        }
        self.metrics.pinned.set(self.ledger.len() as i64);
    }

    /// Mark arriving players present and drop the series of departed ones
    pub fn sample_players(&mut self, host: &dyn HostView) {
        let seen_now: AHashSet<String> = host.players().into_iter().collect();

        for name in seen_now.difference(&self.seen_players) {
            self.metrics.present.with_label_values(&[name.as_str()]).set(1);
        }
        for name in self.seen_players.difference(&seen_now) {
            if let Err(e) = self.metrics.present.remove_label_values(&[name.as_str()]) {
                tracing::debug!("No presence series for {}: {}", name, e);
            }
        }
        self.seen_players = seen_now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::WorldStatus;
    use std::cell::RefCell;

    struct StaticHost {
        worlds: Vec<WorldStatus>,
        players: RefCell<Vec<String>>,
    }

    impl HostView for StaticHost {
        fn worlds(&self) -> Vec<WorldStatus> {
            self.worlds.clone()
        }

        fn players(&self) -> Vec<String> {
            self.players.borrow().clone()
        }
    }

    fn host() -> StaticHost {
        StaticHost {
            worlds: vec![WorldStatus {
                id: WorldId(0),
                name: "Overworld".into(),
                loaded_cells: 400,
                forced_cells: 30,
            }],
            players: RefCell::new(vec!["alice".into(), "bob".into()]),
        }
    }

    fn reporter() -> (TickReporter, Metrics) {
        let metrics = Metrics::new().unwrap();
        let reporter = TickReporter::new(
            ReportingConfig::default(),
            metrics.clone(),
            Arc::new(PinLedger::new()),
        );
        (reporter, metrics)
    }

    fn run_ticks(reporter: &mut TickReporter, host: &StaticHost, n: u64) {
        for _ in 0..n {
            reporter.on_server_tick(TickPhase::Start, host);
            reporter.on_server_tick(TickPhase::End, host);
        }
    }

    #[test]
    fn test_loaded_cells_sampled_at_offset() {
        let (mut reporter, metrics) = reporter();
        let host = host();

        run_ticks(&mut reporter, &host, 26);
        assert_eq!(metrics.loaded_by_cause(CAUSE_OTHER, "Overworld"), 0);

        run_ticks(&mut reporter, &host, 1);
        assert_eq!(metrics.loaded_by_cause(CAUSE_OTHER, "Overworld"), 370);
        assert_eq!(metrics.loaded_by_cause(CAUSE_EXTERNAL, "Overworld"), 30);
        assert_eq!(metrics.loaded_by_cause(CAUSE_CHURN, "Overworld"), 0);
        assert_eq!(metrics.ticks.get(), 27);
    }

    #[test]
    fn test_presence_tracks_arrivals_and_departures() {
        let (mut reporter, metrics) = reporter();
        let host = host();

        reporter.sample_players(&host);
        assert_eq!(metrics.present.with_label_values(&["alice"]).get(), 1);

        *host.players.borrow_mut() = vec!["bob".into()];
        reporter.sample_players(&host);

        let text = metrics.encode_text().unwrap();
        assert!(!text.contains("alice"));
        assert!(text.contains("present{name=\"bob\"} 1"));
    }

    #[test]
    fn test_tick_time_observed_per_tick() {
        let (mut reporter, metrics) = reporter();
        let host = host();

        run_ticks(&mut reporter, &host, 3);
        assert_eq!(metrics.tick_time.get_sample_count(), 3);
        assert_eq!(reporter.server_ticks(), 3);
    }

    #[test]
    fn test_world_time_per_world_label() {
        let (mut reporter, metrics) = reporter();
        reporter.on_world_tick(WorldId(0), "Overworld", TickPhase::Start);
        reporter.on_world_tick(WorldId(-1), "Nether", TickPhase::Start);
        reporter.on_world_tick(WorldId(0), "Overworld", TickPhase::End);

        let overworld = metrics.world_time.with_label_values(&["Overworld"]);
        let nether = metrics.world_time.with_label_values(&["Nether"]);
        assert_eq!(overworld.get_sample_count(), 1);
        assert_eq!(nether.get_sample_count(), 0);
    }

    #[test]
    fn test_unmatched_start_is_not_observed() {
        let (mut reporter, metrics) = reporter();
        let host = host();

        reporter.on_world_tick(WorldId(0), "Overworld", TickPhase::Start);
        reporter.on_world_tick(WorldId(0), "Overworld", TickPhase::Start);
        reporter.on_world_tick(WorldId(0), "Overworld", TickPhase::End);
        let overworld = metrics.world_time.with_label_values(&["Overworld"]);
        assert_eq!(overworld.get_sample_count(), 1);

        reporter.on_server_tick(TickPhase::Start, &host);
        reporter.on_server_tick(TickPhase::Start, &host);
        reporter.on_server_tick(TickPhase::End, &host);
        assert_eq!(metrics.tick_time.get_sample_count(), 1);
    }

    #[test]
    fn test_end_without_start_is_harmless() {
        let (mut reporter, metrics) = reporter();
        reporter.on_server_tick(TickPhase::End, &host());
        reporter.on_world_tick(WorldId(0), "Overworld", TickPhase::End);
        assert_eq!(metrics.ticks.get(), 1);
        assert_eq!(metrics.tick_time.get_sample_count(), 0);
    }
}
