//! The external pin facility
//!
//! Pins are held through tickets handed out by the host. A ticket is a
//! capability: while it is held the cell it was forced for stays loaded, and
//! it has to be handed back exactly once. `Ticket` is neither `Clone` nor
//! `Copy`, and `release_pin` takes it by value, so a double release does not
//! type-check.

use crate::core::types::{CellCoord, WorldId};
use thiserror::Error;

/// Opaque handle for one acquired pin
#[derive(Debug, PartialEq, Eq)]
pub struct Ticket {
    id: u64,
    world: WorldId,
}

impl Ticket {
    /// Mint a ticket. Only facility implementations should call this.
    pub fn new(id: u64, world: WorldId) -> Self {
        Self { id, world }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn world(&self) -> WorldId {
        self.world
    }
}

/// Why a ticket could not be acquired
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FacilityError {
    #[error("ticket capacity exhausted for world {0}")]
    Exhausted(WorldId),

    #[error("ticket request rejected: {0}")]
    Rejected(String),
}

/// Acquire, force and release primitives offered by the host
pub trait PinFacility {
    /// Acquire a ticket for `coord` on behalf of `owner`
    fn request_pin(&mut self, owner: &str, coord: CellCoord) -> Result<Ticket, FacilityError>;

    /// Commit the pin for `coord` under an acquired ticket
    fn force_pin(&mut self, ticket: &Ticket, coord: CellCoord);

    /// Return a ticket, unpinning everything forced under it
    fn release_pin(&mut self, ticket: Ticket);

    /// Whether another owner already keeps `coord` loaded
    fn is_externally_pinned(&self, coord: CellCoord) -> bool;
}
