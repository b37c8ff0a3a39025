//! `slotsim-core`: identifiers, configuration and the shared error type for
//! the slot scheduling simulator.

pub mod config;
pub mod error;
pub mod types;

pub use config::SimConfig;
pub use error::{CoreError, Result};
pub use types::{ClientId, IdAllocator, JobId, LogicalClock, SlotId};
