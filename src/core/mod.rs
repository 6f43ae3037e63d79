pub mod config;
pub mod error;
pub mod types;

pub use config::ChurnConfig;
pub use error::{ChurnError, Result};
pub use types::{CellCoord, Tick, WorldId};
