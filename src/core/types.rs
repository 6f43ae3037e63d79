//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server tick counter (simulation time unit)
pub type Tick = u64;

/// Identifier of a world (dimension) hosted by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(pub i32);

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of one cell (chunk) inside a world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub x: i32,
    pub z: i32,
    pub world: WorldId,
}

impl CellCoord {
    pub fn new(x: i32, z: i32, world: WorldId) -> Self {
        Self { x, z, world }
    }

    /// The cell displaced by `(dx, dz)` in the same world
    pub fn offset(&self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
            world: self.world,
        }
    }

    /// Like `offset`, but `None` past the edge of the coordinate range
    pub fn checked_offset(&self, dx: i32, dz: i32) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add(dx)?,
            z: self.z.checked_add(dz)?,
            world: self.world,
        })
    }

    /// All cells within `radius` on both axes, excluding `self`.
    /// Cells past the edge of the coordinate range are skipped.
    pub fn neighbors(&self, radius: i32) -> impl Iterator<Item = CellCoord> + '_ {
        (-radius..=radius).flat_map(move |dx| {
            (-radius..=radius)
                .filter(move |&dz| dx != 0 || dz != 0)
                .filter_map(move |dz| self.checked_offset(dx, dz))
        })
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]@{}", self.x, self.z, self.world)
    }
}
