use rand::{rngs::StdRng, Rng, SeedableRng};
use slotsim_core::{ClientId, SimConfig};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    error::{Result, SchedulerError},
    priority::{size_term, PriorityScheduler},
    size::{generate_size, Size},
    state::SchedulerState,
    types::{Job, RunState, SimEvent, Snapshot, SlotJob, TickReport},
};

/// Synchronous simulation core: scheduling pass, progress advancement and
/// the Stopped/Running lifecycle.
///
/// All mutation happens through `&mut self`, so a single owner (normally the
/// [`crate::engine::SimulationEngine`] task) serialises every transition.
pub struct Simulation {
    config: SimConfig,
    state: SchedulerState,
    scheduler: PriorityScheduler,
    run_state: RunState,
    tick: u64,
    rng: StdRng,
    events: broadcast::Sender<SimEvent>,
}

impl Simulation {
    /// Build a stopped simulation. Seeds the RNG from `config.seed` when set.
    pub fn new(config: SimConfig) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }

    pub fn with_rng(config: SimConfig, rng: StdRng) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_capacity);
        Ok(Self {
            state: SchedulerState::new(config.slots),
            scheduler: PriorityScheduler::new(config.priority.size_basis),
            run_state: RunState::Stopped,
            tick: 0,
            rng,
            events,
            config,
        })
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn start(&mut self) -> RunState {
        if self.run_state == RunState::Stopped {
            self.run_state = RunState::Running;
            info!(tick = self.tick, "simulation started");
        }
        self.run_state
    }

    /// Halt ticking. Clients and slot progress are kept for a later resume.
    pub fn stop(&mut self) -> RunState {
        if self.run_state == RunState::Running {
            self.run_state = RunState::Stopped;
            info!(tick = self.tick, "simulation stopped");
        }
        self.run_state
    }

    pub fn toggle(&mut self) -> RunState {
        match self.run_state {
            RunState::Running => self.stop(),
            RunState::Stopped => self.start(),
        }
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    // -----------------------------------------------------------------------
    // Clients
    // -----------------------------------------------------------------------

    /// Create a client with a random number of randomly sized jobs.
    ///
    /// Only valid while running.
    pub fn add_client(&mut self) -> Result<(ClientId, Vec<Job>)> {
        self.ensure_running("add a client")?;
        let jobs = &self.config.jobs_per_client;
        let count = self.rng.gen_range(jobs.min..=jobs.max);
        let range = &self.config.size;
        let sizes: Vec<Size> = (0..count)
            .map(|_| generate_size(&mut self.rng, range.min_bytes, range.max_bytes))
            .collect();
        self.add_client_with_sizes(sizes)
    }

    /// Create a client with the given job sizes. Jobs are ordered ascending
    /// by the configured size basis before they are stored.
    pub fn add_client_with_sizes(&mut self, mut sizes: Vec<Size>) -> Result<(ClientId, Vec<Job>)> {
        self.ensure_running("add a client")?;
        if sizes.is_empty() {
            return Err(SchedulerError::InvalidTransition(
                "a client needs at least one job".into(),
            ));
        }
        let basis = self.scheduler.basis();
        sizes.sort_by(|a, b| size_term(*a, basis).total_cmp(&size_term(*b, basis)));
        Ok(self.state.add_client(&sizes))
    }

    fn ensure_running(&self, what: &str) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(SchedulerError::InvalidTransition(format!(
                "cannot {what} while stopped"
            )))
        }
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// One scheduling + progress pass. Does nothing while stopped.
    ///
    /// Scheduling runs first, so jobs bound in this pass only start moving
    /// on the next one.
    pub fn tick(&mut self) -> TickReport {
        if !self.is_running() {
            return TickReport::default();
        }
        self.tick += 1;
        self.state.clock.advance(self.config.tick_ms);

        let assigned = self.scheduler.fill_slots(&mut self.state, self.tick);
        let completed = self
            .state
            .slots
            .advance(self.config.tick_ms as f64, self.tick);

        for done in &completed {
            if !self.state.complete(done) {
                warn!(client_id = %done.client_id, job_id = %done.job_id, "completed job was already gone");
            }
            let _ = self.events.send(SimEvent::JobCompleted(*done));
        }

        if let Err(e) = self.state.check_invariants() {
            warn!(tick = self.tick, "state invariant violated: {e}");
        }

        debug!(
            tick = self.tick,
            assigned = assigned.len(),
            completed = completed.len(),
            clients = self.state.queue.len(),
            "tick processed"
        );
        let _ = self.events.send(SimEvent::Tick(self.snapshot()));

        TickReport {
            assigned: assigned.into_iter().map(|a| (a.slot, a.job)).collect(),
            completed,
        }
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            now_ms: self.state.clock.now(),
            state: self.run_state,
            clients: self.state.client_views(),
            slots: self.state.slots.views(),
        }
    }

    /// Receive a [`SimEvent`] after every tick and every completion.
    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<SimEvent> {
        self.events.clone()
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Jobs currently bound to slots, lowest slot first.
    pub fn in_flight(&self) -> Vec<SlotJob> {
        self.state.slots.iter().filter_map(|s| s.job().copied()).collect()
    }
}
