//! Pin ledger - the authoritative record of pinned cells
//!
//! Written by the scheduler only, read concurrently by the metrics reporter
//! and the chunk map endpoint. Readers may see slightly stale data but never
//! a half-built record.

use crate::core::types::{CellCoord, Tick, WorldId};
use crate::host::Ticket;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;

/// A pinned cell and the ticket holding it
#[derive(Debug)]
pub struct PinRecord {
    pub coord: CellCoord,
    pub ticket: Ticket,
    pub release_at: Tick,
}

/// Ticket-free view of a pin, safe to hand to readers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinnedCell {
    pub coord: CellCoord,
    pub release_at: Tick,
}

impl From<&PinRecord> for PinnedCell {
    fn from(record: &PinRecord) -> Self {
        Self {
            coord: record.coord,
            release_at: record.release_at,
        }
    }
}

#[derive(Debug, Default)]
pub struct PinLedger {
    pins: DashMap<CellCoord, PinRecord>,
    per_world: DashMap<WorldId, usize>,
}

impl PinLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record for a cell that is not pinned yet.
    ///
    /// A cell that is already pinned is never overwritten; the new record is
    /// handed back so its ticket can still be returned.
    pub fn insert(&self, record: PinRecord) -> Result<(), PinRecord> {
        let world = record.coord.world;
        match self.pins.entry(record.coord) {
            Entry::Occupied(_) => return Err(record),
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
        *self.per_world.entry(world).or_insert(0) += 1;
        Ok(())
    }

    pub fn remove(&self, coord: &CellCoord) -> Option<PinRecord> {
        let (_, record) = self.pins.remove(coord)?;
        let emptied = match self.per_world.get_mut(&coord.world) {
            Some(mut count) => {
                *count = count.saturating_sub(1);
                *count == 0
            }
            None => false,
        };
        if emptied {
            self.per_world.remove_if(&coord.world, |_, count| *count == 0);
        }
        Some(record)
    }

    pub fn contains(&self, coord: &CellCoord) -> bool {
        self.pins.contains_key(coord)
    }

    pub fn get(&self, coord: &CellCoord) -> Option<PinnedCell> {
        self.pins.get(coord).map(|record| PinnedCell::from(record.value()))
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Every pin currently held, in no particular order
    pub fn snapshot(&self) -> Vec<PinnedCell> {
        self.pins
            .iter()
            .map(|entry| PinnedCell::from(entry.value()))
            .collect()
    }

    /// Pinned coordinates grouped by world
    pub fn snapshot_by_world(&self) -> BTreeMap<WorldId, Vec<CellCoord>> {
        let mut grouped: BTreeMap<WorldId, Vec<CellCoord>> = BTreeMap::new();
        for entry in self.pins.iter() {
            grouped.entry(entry.key().world).or_default().push(*entry.key());
        }
        grouped
    }

    /// Pinned coordinates of one world
    pub fn cells_in(&self, world: WorldId) -> Vec<CellCoord> {
        self.pins
            .iter()
            .filter(|entry| entry.key().world == world)
            .map(|entry| *entry.key())
            .collect()
    }

    /// Maintained pin count for one world
    pub fn pinned_in(&self, world: WorldId) -> usize {
        self.per_world.get(&world).map(|count| *count).unwrap_or(0)
    }

    /// Maintained pin counts for all worlds with at least one pin
    pub fn counts_by_world(&self) -> BTreeMap<WorldId, usize> {
        self.per_world
            .iter()
            .filter(|entry| *entry.value() > 0)
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    /// Per-world counts derived from the records themselves
    pub fn recount_by_world(&self) -> BTreeMap<WorldId, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.pins.iter() {
            *counts.entry(entry.key().world).or_insert(0) += 1;
        }
        counts
    }

    /// Remove every record, leaving the tickets to the caller
    pub fn drain(&self) -> Vec<PinRecord> {
        let coords: Vec<CellCoord> = self.pins.iter().map(|entry| *entry.key()).collect();
        coords.iter().filter_map(|coord| self.remove(coord)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(x: i32, z: i32, world: i32, release_at: Tick) -> PinRecord {
        let coord = CellCoord::new(x, z, WorldId(world));
        PinRecord {
            coord,
            ticket: Ticket::new((x as u64) << 8 | z as u64, coord.world),
            release_at,
        }
    }

    #[test]
    fn test_insert_and_remove() {
        let ledger = PinLedger::new();
        assert!(ledger.insert(record(0, 0, 0, 100)).is_ok());
        assert!(ledger.contains(&CellCoord::new(0, 0, WorldId(0))));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.pinned_in(WorldId(0)), 1);

        let removed = ledger.remove(&CellCoord::new(0, 0, WorldId(0))).unwrap();
        assert_eq!(removed.release_at, 100);
        assert!(ledger.is_empty());
        assert_eq!(ledger.pinned_in(WorldId(0)), 0);
    }

    #[test]
    fn test_duplicate_insert_is_rejected_not_overwritten() {
        let ledger = PinLedger::new();
        ledger.insert(record(1, 1, 0, 100)).unwrap();

        let rejected = ledger.insert(record(1, 1, 0, 999)).unwrap_err();
        assert_eq!(rejected.release_at, 999);
        assert_eq!(ledger.get(&CellCoord::new(1, 1, WorldId(0))).unwrap().release_at, 100);
        assert_eq!(ledger.pinned_in(WorldId(0)), 1);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let ledger = PinLedger::new();
        ledger.insert(record(1, 1, 0, 100)).unwrap();
        assert!(ledger.remove(&CellCoord::new(5, 5, WorldId(0))).is_none());
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.pinned_in(WorldId(0)), 1);
    }

    #[test]
    fn test_world_counts_match_recount() {
        let ledger = PinLedger::new();
        ledger.insert(record(0, 0, 0, 10)).unwrap();
        ledger.insert(record(1, 0, 0, 10)).unwrap();
        ledger.insert(record(0, 0, -1, 10)).unwrap();
        ledger.remove(&CellCoord::new(0, 0, WorldId(0)));

        assert_eq!(ledger.counts_by_world(), ledger.recount_by_world());
        assert_eq!(ledger.pinned_in(WorldId(-1)), 1);
    }

    #[test]
    fn test_snapshot_by_world() {
        let ledger = PinLedger::new();
        ledger.insert(record(0, 0, 0, 10)).unwrap();
        ledger.insert(record(2, 3, 0, 10)).unwrap();
        ledger.insert(record(7, 7, 1, 10)).unwrap();

        let grouped = ledger.snapshot_by_world();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&WorldId(0)].len(), 2);
        assert_eq!(grouped[&WorldId(1)], vec![CellCoord::new(7, 7, WorldId(1))]);
        assert_eq!(ledger.cells_in(WorldId(1)).len(), 1);
    }

    #[test]
    fn test_drain_empties_counts() {
        let ledger = PinLedger::new();
        ledger.insert(record(0, 0, 0, 10)).unwrap();
        ledger.insert(record(0, 1, 1, 10)).unwrap();

        let drained = ledger.drain();
        assert_eq!(drained.len(), 2);
        assert!(ledger.is_empty());
        assert!(ledger.counts_by_world().is_empty());
    }

    #[test]
    fn test_concurrent_readers_never_panic() {
        use std::sync::Arc;
        use std::thread;

        let ledger = Arc::new(PinLedger::new());
        let reader = {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for _ in 0..200 {
                    let snapshot = ledger.snapshot();
                    assert!(snapshot.iter().all(|cell| cell.release_at > 0));
                    let _ = ledger.snapshot_by_world();
                }
            })
        };

        for i in 0..200 {
            ledger.insert(record(i, 0, 0, 50)).unwrap();
            if i % 2 == 0 {
                ledger.remove(&CellCoord::new(i, 0, WorldId(0)));
            }
        }
        reader.join().unwrap();
        assert_eq!(ledger.len(), 100);
    }
}
