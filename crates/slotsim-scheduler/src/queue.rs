use std::collections::{BTreeMap, HashSet};

use slotsim_core::{ClientId, JobId};
use tracing::{debug, info};

use crate::{
    error::{Result, SchedulerError},
    types::{Client, Job, JobStatus},
};

/// Owns every client and its job sequence.
///
/// Clients are keyed by id; ids are allocated monotonically, so iteration
/// order is arrival order and stays deterministic across a run.
#[derive(Debug, Default, Clone)]
pub struct JobQueue {
    clients: BTreeMap<ClientId, Client>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a client with the given (already ordered) job sequence.
    pub fn add_client(&mut self, id: ClientId, jobs: Vec<Job>, arrival_ms: u64) -> ClientId {
        info!(client_id = %id, jobs = jobs.len(), arrival_ms, "client added");
        self.clients.insert(
            id,
            Client {
                id,
                jobs,
                arrival_ms,
            },
        );
        id
    }

    /// Every client holding at least one pending job, paired with its
    /// earliest pending job. At most one candidate per client.
    pub fn pending_jobs_by_client(&self) -> Vec<(&Client, &Job)> {
        self.pending_jobs_by_client_excluding(&HashSet::new())
    }

    /// Like [`Self::pending_jobs_by_client`], treating jobs in `taken` as if
    /// they were no longer pending.
    pub fn pending_jobs_by_client_excluding(
        &self,
        taken: &HashSet<JobId>,
    ) -> Vec<(&Client, &Job)> {
        self.clients
            .values()
            .filter_map(|c| {
                c.jobs
                    .iter()
                    .find(|j| j.is_pending() && !taken.contains(&j.id))
                    .map(|j| (c, j))
            })
            .collect()
    }

    /// Transition a pending job to Assigned.
    pub fn mark_assigned(&mut self, client_id: ClientId, job_id: JobId) -> Result<()> {
        let job = self
            .job_mut(client_id, job_id)
            .ok_or(SchedulerError::StaleReference { client_id, job_id })?;
        if job.status == JobStatus::Assigned {
            return Err(SchedulerError::InvalidTransition(format!(
                "job {job_id} of client {client_id} is already {}",
                job.status
            )));
        }
        job.status = JobStatus::Assigned;
        debug!(client_id = %client_id, job_id = %job_id, "job marked assigned");
        Ok(())
    }

    /// Remove a job, and its client once the sequence is empty.
    ///
    /// Returns `false` (and changes nothing) if the job is already gone.
    pub fn complete_job(&mut self, client_id: ClientId, job_id: JobId) -> bool {
        let Some(client) = self.clients.get_mut(&client_id) else {
            return false;
        };
        let before = client.jobs.len();
        client.jobs.retain(|j| j.id != job_id);
        if client.jobs.len() == before {
            return false;
        }
        if client.jobs.is_empty() {
            self.clients.remove(&client_id);
            info!(client_id = %client_id, "client drained and removed");
        }
        true
    }

    pub fn client(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub fn job(&self, client_id: ClientId, job_id: JobId) -> Option<&Job> {
        self.clients
            .get(&client_id)?
            .jobs
            .iter()
            .find(|j| j.id == job_id)
    }

    fn job_mut(&mut self, client_id: ClientId, job_id: JobId) -> Option<&mut Job> {
        self.clients
            .get_mut(&client_id)?
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id)
    }

    /// All clients in arrival order.
    pub fn clients(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    /// Current number of clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
