use slotsim_core::{ClientId, IdAllocator, LogicalClock};

use crate::{
    error::{Result, SchedulerError},
    queue::JobQueue,
    size::Size,
    slots::SlotSimulator,
    types::{ClientView, Job, JobView, SlotJob},
};

/// The aggregate the tick routine owns and mutates: clients, slots, the
/// logical clock and the id allocator.
#[derive(Debug, Clone)]
pub struct SchedulerState {
    pub queue: JobQueue,
    pub slots: SlotSimulator,
    pub clock: LogicalClock,
    pub ids: IdAllocator,
}

impl SchedulerState {
    pub fn new(slot_count: usize) -> Self {
        Self {
            queue: JobQueue::new(),
            slots: SlotSimulator::new(slot_count),
            clock: LogicalClock::new(),
            ids: IdAllocator::new(),
        }
    }

    /// Create a client stamped with the current logical time. `sizes` must
    /// already be in the desired sequence order.
    pub fn add_client(&mut self, sizes: &[Size]) -> (ClientId, Vec<Job>) {
        let id = self.ids.next_client();
        let jobs: Vec<Job> = sizes
            .iter()
            .map(|&size| Job::new(self.ids.next_job(), size))
            .collect();
        self.queue.add_client(id, jobs.clone(), self.clock.now());
        (id, jobs)
    }

    /// Finish a job reported by a slot. No-op when the job is already gone.
    pub fn complete(&mut self, done: &SlotJob) -> bool {
        self.queue.complete_job(done.client_id, done.job_id)
    }

    pub fn client_views(&self) -> Vec<ClientView> {
        self.queue
            .clients()
            .map(|c| ClientView {
                id: c.id,
                jobs: c
                    .jobs
                    .iter()
                    .map(|j| JobView {
                        id: j.id,
                        size: j.size,
                        display: j.size.format(),
                        in_progress: !j.is_pending(),
                    })
                    .collect(),
                arrival_ms: c.arrival_ms,
                waiting_secs: self.clock.seconds_since(c.arrival_ms),
            })
            .collect()
    }

    /// Check the cross-structure invariants: every slot-bound job exists in
    /// its client's sequence as Assigned, and no job is bound twice.
    pub fn check_invariants(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for slot in self.slots.iter() {
            let Some(job) = slot.job() else { continue };
            if !seen.insert(job.job_id) {
                return Err(SchedulerError::InvariantViolated(format!(
                    "job {} bound to more than one slot",
                    job.job_id
                )));
            }
            match self.queue.job(job.client_id, job.job_id) {
                Some(j) if !j.is_pending() => {}
                Some(_) => {
                    return Err(SchedulerError::InvariantViolated(format!(
                        "slot {} holds job {} which is still pending",
                        slot.id, job.job_id
                    )))
                }
                None => {
                    return Err(SchedulerError::InvariantViolated(format!(
                        "slot {} holds job {} missing from client {}",
                        slot.id, job.job_id, job.client_id
                    )))
                }
            }
        }
        Ok(())
    }
}
