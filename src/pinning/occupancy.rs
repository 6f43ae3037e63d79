//! Neighbor occupancy - last-known count of significant objects per cell
//!
//! An empty cell is still worth pinning when something worth protecting sits
//! next to it: unloading it would cut the occupied neighbor off at the edge
//! of the loaded area.

use crate::core::types::CellCoord;
use ahash::AHashMap;

pub struct OccupancyIndex {
    radius: i32,
    counts: AHashMap<CellCoord, usize>,
}

impl OccupancyIndex {
    /// `radius` 2 scans the surrounding 5x5 block
    pub fn new(radius: i32) -> Self {
        Self {
            radius,
            counts: AHashMap::new(),
        }
    }

    pub fn record(&mut self, coord: CellCoord, count: usize) {
        self.counts.insert(coord, count);
    }

    pub fn count(&self, coord: &CellCoord) -> usize {
        self.counts.get(coord).copied().unwrap_or(0)
    }

    /// True if any cell around `coord` (not `coord` itself) was last seen
    /// with a non-zero count
    pub fn has_significant_neighbor(&self, coord: &CellCoord) -> bool {
        coord
            .neighbors(self.radius)
            .any(|neighbor| self.count(&neighbor) > 0)
    }

    pub fn tracked_cells(&self) -> usize {
        self.counts.len()
    }
}
