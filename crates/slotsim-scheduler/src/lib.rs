//! `slotsim-scheduler`: priority scheduling of simulated file transfers onto
//! a fixed pool of processing slots.
//!
//! # Overview
//!
//! Clients arrive with 1..K jobs of random size. Every tick the
//! [`priority::PriorityScheduler`] fills free slots with the highest-scoring
//! pending job, then the [`slots::SlotSimulator`] advances each busy slot at a
//! rate derived from its job's size. A finished job leaves its client, and a
//! client with no jobs left leaves the queue.
//!
//! | Piece                 | Role                                          |
//! |-----------------------|-----------------------------------------------|
//! | [`size`]              | Size generation, formatting, unit handling    |
//! | [`queue::JobQueue`]   | Clients and their ordered job sequences       |
//! | [`priority`]          | Scoring and the plan/apply slot-filling pass  |
//! | [`slots`]             | Slot state machine and progress model         |
//! | [`Simulation`]        | Synchronous tick + Stopped/Running lifecycle  |
//! | [`SimulationEngine`]  | Tokio driver with a command handle            |

pub mod engine;
pub mod error;
pub mod priority;
pub mod queue;
pub mod simulation;
pub mod size;
pub mod slots;
pub mod state;
pub mod types;

pub use engine::{SimulationEngine, SimulationHandle};
pub use error::{Result, SchedulerError};
pub use simulation::Simulation;
pub use size::Size;
pub use types::{Client, Completion, Job, JobStatus, RunState, SimEvent, Snapshot, TickReport};
