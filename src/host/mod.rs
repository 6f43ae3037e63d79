//! Boundary with the embedding server
//!
//! The host talks to this crate through three narrow traits: it feeds cell
//! notifications into a [`CellListener`], offers pins through a
//! [`PinFacility`], and exposes read-only world state through [`HostView`].

pub mod events;
pub mod facility;

pub use events::{EventDispatcher, HostEvent, TickPhase};
pub use facility::{FacilityError, PinFacility, Ticket};

use crate::core::types::{CellCoord, Tick, WorldId};

/// Receives cell notifications from the host
pub trait CellListener {
    /// A cell finished loading with `occupants` significant objects in it
    fn on_cell_observed(&mut self, coord: CellCoord, now: Tick, occupants: usize);

    /// A cell was unloaded by the host
    fn on_cell_released(&mut self, coord: CellCoord, now: Tick);

    /// End of a server tick; nothing loaded is implied
    fn on_server_tick(&mut self, _now: Tick) {}
}

/// Load state of one world, as reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldStatus {
    pub id: WorldId,
    pub name: String,
    /// Every cell currently resident
    pub loaded_cells: usize,
    /// Cells held by any ticket, including ours
    pub forced_cells: usize,
}

/// Read-only view of host state used for reporting
pub trait HostView {
    fn worlds(&self) -> Vec<WorldStatus>;

    /// Display names of the players currently online
    fn players(&self) -> Vec<String>;
}
