//! Load history - recent load ticks per cell
//!
//! Each cell keeps the ticks it was observed at, oldest first, trimmed to a
//! sliding age window. The window length is the churn signal fed to the
//! duration and release policies.

use crate::core::types::{CellCoord, Tick};
use ahash::AHashMap;
use std::collections::VecDeque;

pub struct LoadHistory {
    age_window: Tick,
    loads: AHashMap<CellCoord, VecDeque<Tick>>,
}

impl LoadHistory {
    pub fn new(age_window: Tick) -> Self {
        Self {
            age_window,
            loads: AHashMap::new(),
        }
    }

    pub fn age_window(&self) -> Tick {
        self.age_window
    }

    /// Append `now` and drop entries older than the window.
    ///
    /// Returns the number of loads left inside the window.
    pub fn record(&mut self, coord: CellCoord, now: Tick) -> usize {
        let threshold = now.saturating_sub(self.age_window);
        let loads = self.loads.entry(coord).or_default();
        loads.push_back(now);
        while loads.front().is_some_and(|&t| t < threshold) {
            loads.pop_front();
        }
        loads.len()
    }

    pub fn count_recent(&self, coord: &CellCoord) -> usize {
        self.loads.get(coord).map_or(0, VecDeque::len)
    }

    /// Loads still inside the window at `now`, without pruning
    pub fn count_within(&self, coord: &CellCoord, now: Tick) -> usize {
        let threshold = now.saturating_sub(self.age_window);
        self.loads
            .get(coord)
            .map_or(0, |loads| loads.iter().filter(|&&t| t >= threshold).count())
    }

    /// Recorded ticks for a cell, oldest first
    pub fn ticks(&self, coord: &CellCoord) -> Vec<Tick> {
        self.loads
            .get(coord)
            .map(|loads| loads.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Drop cells whose newest load has aged out of the window
    pub fn forget_stale(&mut self, now: Tick) -> usize {
        let threshold = now.saturating_sub(self.age_window);
        let before = self.loads.len();
        self.loads
            .retain(|_, loads| loads.back().is_some_and(|&t| t >= threshold));
        before - self.loads.len()
    }

    pub fn tracked_cells(&self) -> usize {
        self.loads.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::WorldId;

    fn cell() -> CellCoord {
        CellCoord::new(4, 4, WorldId(0))
    }

    #[test]
    fn test_counts_loads_inside_window() {
        let mut history = LoadHistory::new(100);
        assert_eq!(history.record(cell(), 10), 1);
        assert_eq!(history.record(cell(), 50), 2);
        assert_eq!(history.record(cell(), 110), 3);
        // 10 is now older than 150 - 100
        assert_eq!(history.record(cell(), 150), 3);
        assert_eq!(history.ticks(&cell()), vec![50, 110, 150]);
    }

    #[test]
    fn test_boundary_entry_is_kept() {
        let mut history = LoadHistory::new(100);
        history.record(cell(), 0);
        assert_eq!(history.record(cell(), 100), 2);
        assert_eq!(history.record(cell(), 101), 2);
    }

    #[test]
    fn test_widely_spaced_loads_leave_one_entry() {
        let mut history = LoadHistory::new(100);
        for i in 0..10 {
            assert_eq!(history.record(cell(), i * 101), 1);
        }
        assert_eq!(history.count_recent(&cell()), 1);
    }

    #[test]
    fn test_unknown_cell_has_no_loads() {
        let history = LoadHistory::new(100);
        assert_eq!(history.count_recent(&cell()), 0);
        assert!(history.ticks(&cell()).is_empty());
    }

    #[test]
    fn test_count_within_does_not_prune() {
        let mut history = LoadHistory::new(100);
        history.record(cell(), 10);
        history.record(cell(), 90);
        assert_eq!(history.count_within(&cell(), 150), 1);
        assert_eq!(history.count_recent(&cell()), 2);
    }

    #[test]
    fn test_forget_stale() {
        let mut history = LoadHistory::new(100);
        history.record(cell(), 10);
        history.record(CellCoord::new(0, 0, WorldId(0)), 190);

        assert_eq!(history.forget_stale(200), 1);
        assert_eq!(history.tracked_cells(), 1);
        assert_eq!(history.count_recent(&cell()), 0);
    }
}
