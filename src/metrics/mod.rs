//! Metric families exported to the scraper
//!
//! Everything lives in one explicitly constructed registry. Tests build their
//! own `Metrics` and never share state with each other or the binary.

pub mod reporter;

pub use reporter::TickReporter;

use crate::core::error::{ChurnError, Result};
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

/// Load cause label for cells held by other owners' tickets
pub const CAUSE_EXTERNAL: &str = "chunkloader";
/// Load cause label for cells pinned by this crate
pub const CAUSE_CHURN: &str = "chunkchurn";
/// Load cause label for everything else
pub const CAUSE_OTHER: &str = "other";

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// Cells currently pinned by the scheduler
    pub pinned: IntGauge,
    pub pin_attempts: IntCounter,
    pub pin_failures: IntCounter,
    pub pins: IntCounter,
    pub releases: IntCounter,
    pub ticks: IntCounter,
    pub tick_time: Histogram,
    pub world_time: HistogramVec,
    pub worldgen: IntCounter,
    pub present: IntGaugeVec,
    pub chunks_loaded: IntGaugeVec,
    pub chunk_load: IntCounter,
    pub chunk_unload: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let pinned = IntGauge::new(
            "chunk_churn_patched",
            "Chunks churning, and temporarily chunkloaded",
        )?;
        let pin_attempts = IntCounter::new("chunk_pin_attempts", "Ticket requests made")?;
        let pin_failures = IntCounter::new("chunk_pin_failures", "Ticket requests refused")?;
        let pins = IntCounter::new("chunk_pins", "Chunks pinned")?;
        let releases = IntCounter::new("chunk_releases", "Pins released")?;
        let ticks = IntCounter::new("ticks", "Server ticks")?;
        let tick_time = Histogram::with_opts(HistogramOpts::new("tick_time", "Server tick time"))?;
        let world_time = HistogramVec::new(
            HistogramOpts::new("world_time", "World tick time"),
            &["world"],
        )?;
        let worldgen = IntCounter::new("worldgen", "Chunks generated")?;
        let present = IntGaugeVec::new(Opts::new("present", "Is player present"), &["name"])?;
        let chunks_loaded = IntGaugeVec::new(
            Opts::new("chunks_loaded", "Count of chunks loaded, by cause"),
            &["cause", "world"],
        )?;
        let chunk_load = IntCounter::new("chunk_load", "Chunk load rate")?;
        let chunk_unload = IntCounter::new("chunk_unload", "Chunk unload rate")?;

        registry.register(Box::new(pinned.clone()))?;
        registry.register(Box::new(pin_attempts.clone()))?;
        registry.register(Box::new(pin_failures.clone()))?;
        registry.register(Box::new(pins.clone()))?;
        registry.register(Box::new(releases.clone()))?;
        registry.register(Box::new(ticks.clone()))?;
        registry.register(Box::new(tick_time.clone()))?;
        registry.register(Box::new(world_time.clone()))?;
        registry.register(Box::new(worldgen.clone()))?;
        registry.register(Box::new(present.clone()))?;
        registry.register(Box::new(chunks_loaded.clone()))?;
        registry.register(Box::new(chunk_load.clone()))?;
        registry.register(Box::new(chunk_unload.clone()))?;

        Ok(Self {
            registry,
            pinned,
            pin_attempts,
            pin_failures,
            pins,
            releases,
            ticks,
            tick_time,
            world_time,
            worldgen,
            present,
            chunks_loaded,
            chunk_load,
            chunk_unload,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Current value of one `chunks_loaded` series
    pub fn loaded_by_cause(&self, cause: &str, world: &str) -> i64 {
        self.chunks_loaded.with_label_values(&[cause, world]).get()
    }

    /// Prometheus text exposition of every registered family
    pub fn encode_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| ChurnError::MetricsError(prometheus::Error::Msg(e.to_string())))
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}
