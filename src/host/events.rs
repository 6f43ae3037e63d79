//! Host event translation
//!
//! The host reports what happened as `HostEvent`s; the dispatcher counts them
//! and routes each one to the cell listener or the tick reporter.

use crate::core::types::{CellCoord, Tick, WorldId};
use crate::host::{CellListener, HostView};
use crate::metrics::{Metrics, TickReporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// A cell finished loading
    CellLoaded {
        coord: CellCoord,
        now: Tick,
        occupants: usize,
    },
    /// A cell was unloaded
    CellUnloaded { coord: CellCoord, now: Tick },
    /// Server-wide tick boundary
    ServerTick { now: Tick, phase: TickPhase },
    /// Per-world tick boundary
    WorldTick {
        world: WorldId,
        name: String,
        phase: TickPhase,
    },
    /// A cell was generated for the first time
    CellGenerated { coord: CellCoord },
}

pub struct EventDispatcher<L: CellListener> {
    listener: L,
    reporter: TickReporter,
    metrics: Metrics,
}

impl<L: CellListener> EventDispatcher<L> {
    pub fn new(listener: L, reporter: TickReporter, metrics: Metrics) -> Self {
        Self {
            listener,
            reporter,
            metrics,
        }
    }

    pub fn dispatch(&mut self, event: HostEvent, host: &dyn HostView) {
        match event {
            HostEvent::CellLoaded {
                coord,
                now,
                occupants,
            } => {
                self.listener.on_cell_observed(coord, now, occupants);
                self.metrics.chunk_load.inc();
            }
            HostEvent::CellUnloaded { coord, now } => {
                self.listener.on_cell_released(coord, now);
                self.metrics.chunk_unload.inc();
            }
            HostEvent::ServerTick { now, phase } => {
                if phase == TickPhase::End {
                    self.listener.on_server_tick(now);
                }
                self.reporter.on_server_tick(phase, host);
            }
            HostEvent::WorldTick { world, name, phase } => {
                self.reporter.on_world_tick(world, &name, phase);
            }
            HostEvent::CellGenerated { .. } => {
                self.metrics.worldgen.inc();
            }
        }
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    pub fn reporter(&self) -> &TickReporter {
        &self.reporter
    }

    pub fn into_listener(self) -> L {
        self.listener
    }
}
