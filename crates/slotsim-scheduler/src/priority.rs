//! Priority scoring and the slot-filling pass.
//!
//! A pass first plans every assignment against an immutable borrow of the
//! state, then applies the plan. Planning never mutates; applying never
//! re-scores.

use std::collections::HashSet;

use slotsim_core::{config::SizeBasis, JobId, SlotId};
use tracing::{debug, warn};

use crate::{
    error::{Result, SchedulerError},
    size::Size,
    state::SchedulerState,
    types::SlotJob,
};

/// A scored (client, job) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub job: SlotJob,
    pub priority: f64,
}

/// A planned binding of a job to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub slot: SlotId,
    pub job: SlotJob,
}

/// `total_clients / size_term + waiting_secs / total_clients`.
///
/// Small jobs and long-waiting clients both score higher; both terms are
/// normalised by the current client count.
pub fn score(total_clients: usize, size_term: f64, waiting_secs: f64) -> f64 {
    let n = total_clients as f64;
    n / size_term + waiting_secs / n
}

/// Floor for the size term: the smallest non-zero two-decimal magnitude.
pub const MIN_SIZE_TERM: f64 = 0.01;

/// The number the inverse-size term divides by. Never below
/// [`MIN_SIZE_TERM`], so sizes that display as `0.00 KB` still score finitely.
pub fn size_term(size: Size, basis: SizeBasis) -> f64 {
    let term = match basis {
        SizeBasis::Bytes => size.bytes() as f64,
        SizeBasis::DisplayMagnitude => size.display_magnitude().0,
    };
    term.max(MIN_SIZE_TERM)
}

/// Highest-priority candidate. Ties keep the earliest one.
pub fn pick(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().fold(None, |best, c| match best {
        Some(b) if c.priority > b.priority => Some(c),
        Some(b) => Some(b),
        None => Some(c),
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityScheduler {
    basis: SizeBasis,
}

impl PriorityScheduler {
    pub fn new(basis: SizeBasis) -> Self {
        Self { basis }
    }

    pub fn basis(&self) -> SizeBasis {
        self.basis
    }

    /// Score each client's earliest pending job, skipping jobs in `taken`.
    fn candidates(&self, state: &SchedulerState, taken: &HashSet<JobId>) -> Vec<Candidate> {
        let total = state.queue.len();
        state
            .queue
            .pending_jobs_by_client_excluding(taken)
            .into_iter()
            .map(|(client, job)| {
                let waiting = state.clock.seconds_since(client.arrival_ms);
                Candidate {
                    job: SlotJob {
                        client_id: client.id,
                        job_id: job.id,
                        size: job.size,
                    },
                    priority: score(total, size_term(job.size, self.basis), waiting),
                }
            })
            .collect()
    }

    /// Decide which job goes to which free slot, lowest slot first.
    ///
    /// Once a client's job is planned, its next pending job becomes that
    /// client's candidate for the remaining slots.
    pub fn plan(&self, state: &SchedulerState) -> Vec<Assignment> {
        let mut taken = HashSet::new();
        let mut plan = Vec::new();
        for slot in state.slots.free_slots() {
            let candidates = self.candidates(state, &taken);
            let Some(best) = pick(&candidates) else {
                break;
            };
            debug!(
                slot = %slot,
                client_id = %best.job.client_id,
                job_id = %best.job.job_id,
                priority = best.priority,
                "planned assignment"
            );
            taken.insert(best.job.job_id);
            plan.push(Assignment { slot, job: best.job });
        }
        plan
    }

    /// Commit one planned assignment. Validates before mutating so a
    /// rejected assignment leaves the state untouched.
    pub fn apply(&self, state: &mut SchedulerState, a: &Assignment, tick: u64) -> Result<()> {
        let job = a.job;
        match state.queue.job(job.client_id, job.job_id) {
            None => {
                return Err(SchedulerError::StaleReference {
                    client_id: job.client_id,
                    job_id: job.job_id,
                })
            }
            Some(j) if !j.is_pending() => {
                return Err(SchedulerError::InvalidTransition(format!(
                    "job {} is already assigned",
                    job.job_id
                )))
            }
            Some(_) => {}
        }
        let slot = state
            .slots
            .slot(a.slot)
            .ok_or(SchedulerError::UnknownSlot(a.slot))?;
        if !slot.is_free() || state.slots.holds(&job) {
            return Err(SchedulerError::InvalidTransition(format!(
                "slot {} cannot take job {}",
                a.slot, job.job_id
            )));
        }

        state.queue.mark_assigned(job.client_id, job.job_id)?;
        state.slots.bind(a.slot, job, tick)
    }

    /// Fill free slots until none remain or no candidate is left.
    ///
    /// An assignment that went stale between planning and applying is
    /// skipped and selection is retried with the remaining free slots.
    pub fn fill_slots(&self, state: &mut SchedulerState, tick: u64) -> Vec<Assignment> {
        let mut applied = Vec::new();
        for _ in 0..=state.slots.len() {
            let plan = self.plan(state);
            if plan.is_empty() {
                break;
            }
            let mut skipped = false;
            for a in plan {
                match self.apply(state, &a, tick) {
                    Ok(()) => applied.push(a),
                    Err(e) => {
                        warn!(slot = %a.slot, job_id = %a.job.job_id, "assignment skipped: {e}");
                        skipped = true;
                    }
                }
            }
            if !skipped {
                break;
            }
        }
        applied
    }
}
