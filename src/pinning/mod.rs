//! Forced-cell pinning
//!
//! Cells that keep unloading and reloading are pinned for a while through
//! the host's ticket facility. The scheduler owns the decision; the ledger
//! is the only piece shared with readers on other threads.

pub mod history;
pub mod ledger;
pub mod occupancy;
pub mod policy;
pub mod schedule;
pub mod scheduler;

pub use history::LoadHistory;
pub use ledger::{PinLedger, PinRecord, PinnedCell};
pub use occupancy::OccupancyIndex;
pub use policy::{DurationPolicy, ReleasePolicy};
pub use schedule::{ReleaseSchedule, ScheduledRelease};
pub use scheduler::{ForcedCellScheduler, PinDecision};
