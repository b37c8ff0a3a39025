//! Fixed pool of processing slots and the progress model that drives them.
//!
//! Each slot moves through `Free -> Busy(0) -> … -> Busy(100) -> Free`.
//! A busy slot is never rebound before its job completes.

use slotsim_core::SlotId;
use tracing::{debug, info};

use crate::{
    error::{Result, SchedulerError},
    size::Size,
    types::{Completion, SlotJob, SlotView},
};

/// Simulated milliseconds needed to move 100 GB.
pub const MS_PER_100_GB: f64 = 3_000.0;

/// Total simulated transfer time for a job of `size`.
pub fn total_simulated_ms(size: Size) -> f64 {
    (size.approx_gb() / 100.0) * MS_PER_100_GB
}

/// Simulated milliseconds per 1% of progress.
pub fn step_ms(size: Size) -> f64 {
    total_simulated_ms(size) / 100.0
}

#[derive(Debug, Clone)]
pub struct Slot {
    pub id: SlotId,
    job: Option<SlotJob>,
    progress: u8,
    /// Elapsed milliseconds not yet converted into whole progress steps.
    carry_ms: f64,
    /// Tick during which the job was bound; progress starts the tick after.
    bound_at_tick: u64,
}

impl Slot {
    fn new(id: SlotId) -> Self {
        Self {
            id,
            job: None,
            progress: 0,
            carry_ms: 0.0,
            bound_at_tick: 0,
        }
    }

    pub fn job(&self) -> Option<&SlotJob> {
        self.job.as_ref()
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_free(&self) -> bool {
        self.job.is_none()
    }

    /// Move the bound job forward by `elapsed_ms`. Returns the job when it
    /// reaches 100% and frees the slot.
    fn advance(&mut self, elapsed_ms: f64) -> Option<Completion> {
        let job = self.job?;
        let step = step_ms(job.size);

        if step.is_finite() && step > 0.0 {
            self.carry_ms += elapsed_ms;
            let steps = (self.carry_ms / step).floor();
            self.carry_ms -= steps * step;
            let next = (self.progress as f64 + steps).min(100.0);
            self.progress = next as u8;
        } else {
            self.progress = 100;
        }

        if self.progress < 100 {
            return None;
        }
        self.job = None;
        self.progress = 0;
        self.carry_ms = 0.0;
        Some(job)
    }

    fn view(&self) -> SlotView {
        SlotView {
            id: self.id,
            job: self.job,
            progress: self.progress,
        }
    }
}

/// The N slots, numbered from 1.
#[derive(Debug, Clone)]
pub struct SlotSimulator {
    slots: Vec<Slot>,
}

impl SlotSimulator {
    pub fn new(count: usize) -> Self {
        Self {
            slots: (1..=count).map(|i| Slot::new(SlotId(i))).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        id.0.checked_sub(1).and_then(|i| self.slots.get(i))
    }

    fn slot_mut(&mut self, id: SlotId) -> Result<&mut Slot> {
        id.0.checked_sub(1)
            .and_then(|i| self.slots.get_mut(i))
            .ok_or(SchedulerError::UnknownSlot(id))
    }

    /// Free slots, lowest number first.
    pub fn free_slots(&self) -> Vec<SlotId> {
        self.slots
            .iter()
            .filter(|s| s.is_free())
            .map(|s| s.id)
            .collect()
    }

    /// Whether any slot currently references `job`.
    pub fn holds(&self, job: &SlotJob) -> bool {
        self.slots
            .iter()
            .any(|s| s.job.is_some_and(|j| j.job_id == job.job_id))
    }

    /// Bind `job` to a free slot with progress 0.
    pub fn bind(&mut self, id: SlotId, job: SlotJob, tick: u64) -> Result<()> {
        if self.holds(&job) {
            return Err(SchedulerError::InvalidTransition(format!(
                "job {} is already bound to a slot",
                job.job_id
            )));
        }
        let slot = self.slot_mut(id)?;
        if let Some(current) = slot.job {
            return Err(SchedulerError::InvalidTransition(format!(
                "slot {id} is busy with job {}",
                current.job_id
            )));
        }
        slot.job = Some(job);
        slot.progress = 0;
        slot.carry_ms = 0.0;
        slot.bound_at_tick = tick;
        debug!(slot = %id, job_id = %job.job_id, size = %job.size, "slot bound");
        Ok(())
    }

    /// Advance every slot that was busy before `tick` by `elapsed_ms`.
    ///
    /// Slots bound during `tick` are left at 0 so a fresh assignment never
    /// progresses in the tick that made it.
    pub fn advance(&mut self, elapsed_ms: f64, tick: u64) -> Vec<Completion> {
        let mut done = Vec::new();
        for slot in &mut self.slots {
            if slot.is_free() || slot.bound_at_tick >= tick {
                continue;
            }
            if let Some(job) = slot.advance(elapsed_ms) {
                info!(
                    slot = %slot.id,
                    client_id = %job.client_id,
                    job_id = %job.job_id,
                    size = %job.size,
                    "job completed"
                );
                done.push(job);
            }
        }
        done
    }

    pub fn views(&self) -> Vec<SlotView> {
        self.slots.iter().map(Slot::view).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }
}
