//! End-to-end tests: simulated host -> dispatcher -> scheduler -> metrics
//!
//! Runs the simulated server for a few thousand ticks with short pin
//! durations so that pins are created and released many times over.

use churnguard::core::config::{ChurnConfig, ForcingConfig};
use churnguard::core::types::WorldId;
use churnguard::host::{EventDispatcher, HostView};
use churnguard::metrics::{Metrics, TickReporter, CAUSE_CHURN, CAUSE_EXTERNAL, CAUSE_OTHER};
use churnguard::pinning::{ForcedCellScheduler, PinLedger};
use churnguard::server::chunkmap;
use churnguard::sim::{SimConfig, SimFacility, SimHost};
use std::sync::Arc;

struct Harness {
    host: SimHost,
    dispatcher: EventDispatcher<ForcedCellScheduler<SimFacility>>,
    ledger: Arc<PinLedger>,
    metrics: Metrics,
}

fn harness(capacity: usize) -> Harness {
    let config = ChurnConfig {
        forcing: ForcingConfig {
            min_force_ticks: 40,
            max_force_ticks: 120,
            load_age_ticks: 600,
            seed: Some(3),
            ..ForcingConfig::default()
        },
        ..ChurnConfig::default()
    };
    config.validate().expect("test config is valid");

    let metrics = Metrics::new().expect("metrics registry");
    let ledger = Arc::new(PinLedger::new());
    let mut facility = SimFacility::new(capacity);
    let host = SimHost::new(
        SimConfig {
            seed: 11,
            ..SimConfig::default()
        },
        &mut facility,
    );
    let scheduler =
        ForcedCellScheduler::new(&config.forcing, facility, Arc::clone(&ledger), metrics.clone());
    let reporter = TickReporter::new(config.reporting.clone(), metrics.clone(), Arc::clone(&ledger));

    Harness {
        host,
        dispatcher: EventDispatcher::new(scheduler, reporter, metrics.clone()),
        ledger,
        metrics,
    }
}

impl Harness {
    fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            let facility = self.dispatcher.listener().facility();
            let events = self.host.step(facility);
            let view = self.host.view(facility);
            for event in events {
                self.dispatcher.dispatch(event, &view);
            }
        }
    }
}

#[test]
fn test_long_run_keeps_ledger_and_facility_in_agreement() {
    let mut h = harness(1_000_000);
    h.run(2000);

    let scheduler = h.dispatcher.listener();
    assert!(h.metrics.pins.get() > 0, "some cells should have been pinned");
    assert!(h.metrics.releases.get() > 0, "short pins should have expired");
    assert!(scheduler.is_consistent());
    assert_eq!(scheduler.facility().outstanding(), h.ledger.len());
    assert_eq!(h.ledger.counts_by_world(), h.ledger.recount_by_world());
    assert_eq!(h.metrics.ticks.get(), 2000);
    assert!(h.metrics.chunk_load.get() >= h.metrics.chunk_unload.get());
    assert!(h.metrics.worldgen.get() > 0);
}

#[test]
fn test_pinned_cells_stay_loaded() {
    let mut h = harness(1_000_000);
    h.run(500);

    let scheduler = h.dispatcher.listener();
    for cell in h.ledger.snapshot() {
        assert!(scheduler.facility().is_forced(&cell.coord));
        assert!(cell.release_at > h.host.now());
    }
}

#[test]
fn test_loaded_cells_broken_down_by_cause() {
    let mut h = harness(1_000_000);
    // Presence is sampled on tick 47 of every 60
    h.run(60);

    let view = h.host.view(h.dispatcher.listener().facility());
    h.dispatcher.reporter().sample_loaded_cells(&view);
    let overworld = view
        .worlds()
        .into_iter()
        .find(|w| w.id == WorldId(0))
        .expect("overworld exists");

    let churn = h.metrics.loaded_by_cause(CAUSE_CHURN, &overworld.name);
    let external = h.metrics.loaded_by_cause(CAUSE_EXTERNAL, &overworld.name);
    let other = h.metrics.loaded_by_cause(CAUSE_OTHER, &overworld.name);
    assert_eq!(churn as usize, h.ledger.pinned_in(WorldId(0)));
    assert!((0..=3).contains(&external));
    assert!(other > 0);

    let text = h.metrics.encode_text().unwrap();
    assert!(text.contains("chunks_loaded{cause=\"chunkchurn\",world=\"Overworld\"}"));
    assert!(text.contains("present{name=\"player1\"} 1"));
}

#[test]
fn test_exhausted_facility_only_counts_failures() {
    let mut h = harness(0);
    h.run(200);

    assert!(h.ledger.is_empty());
    assert!(h.metrics.pin_failures.get() > 0);
    assert_eq!(h.metrics.pin_failures.get(), h.metrics.pin_attempts.get());
    assert_eq!(h.metrics.pins.get(), 0);
}

#[test]
fn test_shutdown_returns_every_ticket() {
    let mut h = harness(1_000_000);
    h.run(300);
    let pinned = h.ledger.len();

    let mut scheduler = h.dispatcher.into_listener();
    assert_eq!(scheduler.release_all(), pinned);
    assert_eq!(scheduler.facility().outstanding(), 0);
    assert_eq!(scheduler.facility().requested(), scheduler.facility().released());
}

#[test]
fn test_chunk_map_of_live_run() {
    let mut h = harness(1_000_000);
    h.run(300);

    let cells = h.ledger.cells_in(WorldId(0));
    let image = chunkmap::render_cells(&cells).unwrap();
    let lit = image.pixels().filter(|p| **p == chunkmap::PIN_COLOR).count();
    assert_eq!(lit, cells.len());
    if cells.is_empty() {
        assert_eq!(image.dimensions(), (1, 1));
    }
}
