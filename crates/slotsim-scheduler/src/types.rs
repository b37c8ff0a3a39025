use serde::{Deserialize, Serialize};
use slotsim_core::{ClientId, JobId, SlotId};

use crate::size::Size;

/// Assignment state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a free slot.
    Pending,
    /// Bound to a slot; stays in its client's sequence until completion.
    Assigned,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Assigned => "assigned",
        };
        write!(f, "{s}")
    }
}

/// A unit of simulated transfer work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub size: Size,
    pub status: JobStatus,
}

impl Job {
    pub fn new(id: JobId, size: Size) -> Self {
        Self {
            id,
            size,
            status: JobStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == JobStatus::Pending
    }
}

/// A submitter with its ordered job sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub jobs: Vec<Job>,
    /// Logical milliseconds at which the client was created.
    pub arrival_ms: u64,
}

/// What a busy slot is working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotJob {
    pub client_id: ClientId,
    pub job_id: JobId,
    pub size: Size,
}

/// Emitted when a slot finishes a job.
pub type Completion = SlotJob;

/// Driver lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Stopped,
    Running,
}

// ---------------------------------------------------------------------------
// Read-only views handed to subscribers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub id: JobId,
    pub size: Size,
    /// Rendered size, e.g. `"12.35 MB"`.
    pub display: String,
    pub in_progress: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientView {
    pub id: ClientId,
    pub jobs: Vec<JobView>,
    pub arrival_ms: u64,
    pub waiting_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotView {
    pub id: SlotId,
    pub job: Option<SlotJob>,
    /// Whole percent in `0..=100`.
    pub progress: u8,
}

/// Stable copy of the simulation state at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub now_ms: u64,
    pub state: RunState,
    pub clients: Vec<ClientView>,
    pub slots: Vec<SlotView>,
}

/// Events delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    /// A scheduling + progress pass finished.
    Tick(Snapshot),
    /// A slot finished its job and is free again.
    JobCompleted(Completion),
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// `(slot, job)` bindings made by the scheduling pass.
    pub assigned: Vec<(SlotId, SlotJob)>,
    pub completed: Vec<Completion>,
}
