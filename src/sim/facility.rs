//! In-process ticket facility for the simulated host

use crate::core::types::{CellCoord, WorldId};
use crate::host::{FacilityError, PinFacility, Ticket};
use ahash::{AHashMap, AHashSet};

pub struct SimFacility {
    capacity: usize,
    next_id: u64,
    tickets: AHashMap<u64, Vec<CellCoord>>,
    forced: AHashMap<CellCoord, usize>,
    external: AHashSet<CellCoord>,
    requested: u64,
    released: u64,
}

impl SimFacility {
    /// `capacity` caps the number of tickets held at once
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_id: 0,
            tickets: AHashMap::new(),
            forced: AHashMap::new(),
            external: AHashSet::new(),
            requested: 0,
            released: 0,
        }
    }

    /// Pin `coord` on behalf of some other owner
    pub fn add_external(&mut self, coord: CellCoord) {
        self.external.insert(coord);
    }

    /// Whether anything, ours or not, keeps `coord` loaded
    pub fn is_forced(&self, coord: &CellCoord) -> bool {
        self.external.contains(coord) || self.forced.get(coord).is_some_and(|&n| n > 0)
    }

    /// Forced cells in `world`, counting each cell once
    pub fn forced_in(&self, world: WorldId) -> usize {
        let mut cells: AHashSet<&CellCoord> = self
            .forced
            .iter()
            .filter(|(coord, n)| coord.world == world && **n > 0)
            .map(|(coord, _)| coord)
            .collect();
        cells.extend(self.external.iter().filter(|coord| coord.world == world));
        cells.len()
    }

    pub fn outstanding(&self) -> usize {
        self.tickets.len()
    }

    pub fn requested(&self) -> u64 {
        self.requested
    }

    pub fn released(&self) -> u64 {
        self.released
    }
}

impl PinFacility for SimFacility {
    fn request_pin(&mut self, _owner: &str, coord: CellCoord) -> Result<Ticket, FacilityError> {
        self.requested += 1;
        if self.tickets.len() >= self.capacity {
            return Err(FacilityError::Exhausted(coord.world));
        }
        self.next_id += 1;
        self.tickets.insert(self.next_id, Vec::new());
        Ok(Ticket::new(self.next_id, coord.world))
    }

    fn force_pin(&mut self, ticket: &Ticket, coord: CellCoord) {
        match self.tickets.get_mut(&ticket.id()) {
            Some(cells) => {
                cells.push(coord);
                *self.forced.entry(coord).or_insert(0) += 1;
            }
            None => tracing::warn!("Force on unknown ticket {}", ticket.id()),
        }
    }

    fn release_pin(&mut self, ticket: Ticket) {
        let Some(cells) = self.tickets.remove(&ticket.id()) else {
            tracing::warn!("Release of unknown ticket {}", ticket.id());
            return;
        };
        self.released += 1;
        for coord in cells {
            if let Some(n) = self.forced.get_mut(&coord) {
                *n -= 1;
                if *n == 0 {
                    self.forced.remove(&coord);
                }
            }
        }
    }

    fn is_externally_pinned(&self, coord: CellCoord) -> bool {
        self.external.contains(&coord)
    }
}
