use slotsim_core::{ClientId, CoreError, JobId, SlotId};
use thiserror::Error;

/// Errors that can occur within the scheduling core.
///
/// None of these are fatal: the tick routine logs and skips them, and the
/// async handle surfaces them to whoever issued the command.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The targeted job no longer exists (completed or never created).
    #[error("Stale reference: job {job_id} of client {client_id}")]
    StaleReference { client_id: ClientId, job_id: JobId },

    /// The targeted slot is outside `1..=N`.
    #[error("Unknown slot: {0}")]
    UnknownSlot(SlotId),

    /// The operation is not valid in the current state (e.g. adding a
    /// client while stopped, binding to a busy slot).
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Slots and client sequences disagree about who holds a job.
    #[error("Invariant violated: {0}")]
    InvariantViolated(String),

    #[error(transparent)]
    Config(#[from] CoreError),

    /// The engine task has exited and no longer accepts commands.
    #[error("Simulation engine closed")]
    EngineClosed,
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
