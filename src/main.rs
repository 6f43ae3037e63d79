//! Churnguard - Entry Point
//!
//! Runs the forced-cell scheduler against the built-in simulated host and
//! serves `/metrics` and `/chunkmap/<world>.png` while it runs.

use churnguard::core::config::ChurnConfig;
use churnguard::core::error::Result;
use churnguard::host::EventDispatcher;
use churnguard::metrics::{Metrics, TickReporter};
use churnguard::pinning::{ForcedCellScheduler, PinLedger};
use churnguard::server::{self, AppState};
use churnguard::sim::{SimConfig, SimFacility, SimHost};

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// How often a progress line is logged (ticks)
const STATUS_INTERVAL: u64 = 1200;

/// Churn damping for a simulated server, with a Prometheus endpoint
#[derive(Parser, Debug)]
#[command(name = "churnguard")]
#[command(about = "Pin churning cells of a simulated server and export load metrics")]
struct Args {
    /// Configuration file (defaults are used if it does not exist)
    #[arg(long, default_value = "churnguard.toml")]
    config: PathBuf,

    /// Override the metrics port from the config file
    #[arg(long, allow_negative_numbers = true)]
    port: Option<i64>,

    /// Seed for both the simulated host and the scheduler
    #[arg(long)]
    seed: Option<u64>,

    /// Wall-clock milliseconds per simulated tick
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,

    /// Stop after this many ticks instead of running until Ctrl-C
    #[arg(long)]
    ticks: Option<u64>,

    /// Number of simulated players
    #[arg(long, default_value_t = 4)]
    players: usize,

    /// Maximum tickets the simulated facility hands out at once
    #[arg(long, default_value_t = 1_000_000)]
    ticket_capacity: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("churnguard=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = ChurnConfig::load(&args.config)?;
    if let Some(port) = args.port {
        config.server.port = port;
        config.normalize();
    }
    if args.seed.is_some() {
        config.forcing.seed = args.seed;
    }

    tracing::info!(
        "Churnguard starting: force window {}..={} ticks, metrics on port {}",
        config.forcing.min_force_ticks,
        config.forcing.max_force_ticks,
        config.server.port
    );

    let metrics = Metrics::new()?;
    let ledger = Arc::new(PinLedger::new());

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.bind_port()));
    let state = AppState::new(metrics.clone(), Arc::clone(&ledger));
    let server_task = server::spawn(addr, state, async move {
        let _ = shutdown_rx.await;
    });

    let mut facility = SimFacility::new(args.ticket_capacity);
    let sim_config = SimConfig {
        players: args.players,
        seed: args.seed.unwrap_or_else(rand::random),
        ..SimConfig::default()
    };
    let mut host = SimHost::new(sim_config, &mut facility);

    let scheduler =
        ForcedCellScheduler::new(&config.forcing, facility, Arc::clone(&ledger), metrics.clone());
    let reporter = TickReporter::new(config.reporting.clone(), metrics.clone(), Arc::clone(&ledger));
    let mut dispatcher = EventDispatcher::new(scheduler, reporter, metrics.clone());

    let mut interval = tokio::time::interval(Duration::from_millis(args.tick_ms.max(1)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }

        let facility = dispatcher.listener().facility();
        let events = host.step(facility);
        let view = host.view(facility);
        for event in events {
            dispatcher.dispatch(event, &view);
        }

        let now = host.now();
        if now % STATUS_INTERVAL == 0 {
            let scheduler = dispatcher.listener();
            tracing::info!(
                "Tick {}: {} cells pinned, {} tickets outstanding, {} refused",
                now,
                ledger.len(),
                scheduler.facility().outstanding(),
                metrics.pin_failures.get()
            );
        }
        if args.ticks.is_some_and(|limit| now >= limit) {
            tracing::info!("Reached tick limit {}", now);
            break;
        }
    }

    let mut scheduler = dispatcher.into_listener();
    scheduler.release_all();

    let _ = shutdown_tx.send(());
    if let Err(e) = server_task.await {
        tracing::error!("Metrics server task panicked: {}", e);
    }

    tracing::info!("Churnguard stopped");
    Ok(())
}
