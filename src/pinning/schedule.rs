//! Release schedule - pending unpins ordered by due tick

use crate::core::types::{CellCoord, Tick};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// One pending release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledRelease {
    pub coord: CellCoord,
    pub release_at: Tick,
}

/// Min-heap on `release_at`; equal ticks come out in insertion order
#[derive(Debug, Default)]
pub struct ReleaseSchedule {
    heap: BinaryHeap<Reverse<(Tick, u64, CellCoord)>>,
    next_seq: u64,
}

impl ReleaseSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, coord: CellCoord, release_at: Tick) {
        self.heap.push(Reverse((release_at, self.next_seq, coord)));
        self.next_seq += 1;
    }

    /// Whether the earliest entry is due at `now`
    pub fn peek_due(&self, now: Tick) -> bool {
        self.next_release().is_some_and(|at| at <= now)
    }

    /// Pop the earliest entry if it is due at `now`
    pub fn pop_due(&mut self, now: Tick) -> Option<ScheduledRelease> {
        if !self.peek_due(now) {
            return None;
        }
        self.heap
            .pop()
            .map(|Reverse((release_at, _, coord))| ScheduledRelease { coord, release_at })
    }

    /// Remove the entry for `coord` ahead of time
    pub fn cancel(&mut self, coord: &CellCoord) -> Option<ScheduledRelease> {
        let found = self
            .heap
            .iter()
            .find(|Reverse((_, _, c))| c == coord)
            .map(|Reverse((release_at, _, c))| ScheduledRelease {
                coord: *c,
                release_at: *release_at,
            })?;
        self.heap.retain(|Reverse((_, _, c))| c != coord);
        Some(found)
    }

    pub fn next_release(&self) -> Option<Tick> {
        self.heap.peek().map(|Reverse((release_at, _, _))| *release_at)
    }

    pub fn contains(&self, coord: &CellCoord) -> bool {
        self.heap.iter().any(|Reverse((_, _, c))| c == coord)
    }

    /// Every pending entry, in no particular order
    pub fn entries(&self) -> impl Iterator<Item = ScheduledRelease> + '_ {
        self.heap
            .iter()
            .map(|Reverse((release_at, _, coord))| ScheduledRelease {
                coord: *coord,
                release_at: *release_at,
            })
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
