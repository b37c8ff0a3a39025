use std::time::Duration;

use slotsim_core::ClientId;
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    time::{Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::{
    error::{Result, SchedulerError},
    simulation::Simulation,
    size::Size,
    types::{Job, RunState, SimEvent, Snapshot},
};

const COMMAND_CAPACITY: usize = 64;

type NewClient = Result<(ClientId, Vec<Job>)>;

enum Command {
    Start(oneshot::Sender<RunState>),
    Stop(oneshot::Sender<RunState>),
    Toggle(oneshot::Sender<RunState>),
    AddClient(oneshot::Sender<NewClient>),
    AddClientWithSizes(Vec<Size>, oneshot::Sender<NewClient>),
    Snapshot(oneshot::Sender<Snapshot>),
}

/// Cloneable handle for controlling a running [`SimulationEngine`].
///
/// Every call is a message to the engine task, so it is applied between
/// ticks and never races a tick in progress.
#[derive(Clone)]
pub struct SimulationHandle {
    tx: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Snapshot>,
    events: broadcast::Sender<SimEvent>,
}

impl SimulationHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| SchedulerError::EngineClosed)?;
        reply_rx.await.map_err(|_| SchedulerError::EngineClosed)
    }

    pub async fn start(&self) -> Result<RunState> {
        self.request(Command::Start).await
    }

    pub async fn stop(&self) -> Result<RunState> {
        self.request(Command::Stop).await
    }

    pub async fn toggle(&self) -> Result<RunState> {
        self.request(Command::Toggle).await
    }

    /// Add a randomly generated client. Fails with `InvalidTransition` while
    /// the simulation is stopped.
    pub async fn add_client(&self) -> Result<(ClientId, Vec<Job>)> {
        self.request(Command::AddClient).await?
    }

    pub async fn add_client_with_sizes(&self, sizes: Vec<Size>) -> Result<(ClientId, Vec<Job>)> {
        self.request(|tx| Command::AddClientWithSizes(sizes, tx)).await?
    }

    /// Fresh snapshot taken by the engine task.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        self.request(Command::Snapshot).await
    }

    /// Most recently published snapshot, without a round trip.
    pub fn latest(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.events.subscribe()
    }
}

/// Drives a [`Simulation`] from a tokio interval while it is running.
///
/// The interval only exists in the Running state. Stopping drops it, so no
/// timer outlives a stop and nothing mutates the state until the next start.
pub struct SimulationEngine {
    sim: Simulation,
    commands: mpsc::Receiver<Command>,
    snapshot_tx: watch::Sender<Snapshot>,
}

impl SimulationEngine {
    /// Wrap `sim` and return the engine together with its control handle.
    pub fn new(sim: Simulation) -> (Self, SimulationHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (snapshot_tx, snapshots) = watch::channel(sim.snapshot());
        let handle = SimulationHandle {
            tx,
            snapshots,
            events: sim.event_sender(),
        };
        (
            Self {
                sim,
                commands,
                snapshot_tx,
            },
            handle,
        )
    }

    /// Main event loop. Runs until `shutdown` broadcasts `true`, the
    /// shutdown sender is dropped, or every handle is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Simulation {
        info!("simulation engine started");
        let period = Duration::from_millis(self.sim.config().tick_ms);
        let mut timer: Option<Interval> = None;

        loop {
            match (self.sim.is_running(), timer.is_some()) {
                (true, false) => {
                    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    timer = Some(interval);
                    debug!(period_ms = period.as_millis() as u64, "tick timer armed");
                }
                (false, true) => {
                    timer = None;
                    debug!("tick timer cancelled");
                }
                _ => {}
            }

            tokio::select! {
                _ = next_tick(&mut timer) => {
                    self.sim.tick();
                    self.publish();
                }
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => {
                        self.handle(cmd);
                        self.publish();
                    }
                    None => {
                        info!("all simulation handles dropped");
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("simulation engine shutting down");
                        break;
                    }
                }
            }
        }
        self.sim
    }

    fn handle(&mut self, cmd: Command) {
        // A dropped reply receiver only means the caller stopped waiting.
        match cmd {
            Command::Start(reply) => {
                let _ = reply.send(self.sim.start());
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.sim.stop());
            }
            Command::Toggle(reply) => {
                let _ = reply.send(self.sim.toggle());
            }
            Command::AddClient(reply) => {
                let _ = reply.send(self.sim.add_client());
            }
            Command::AddClientWithSizes(sizes, reply) => {
                let _ = reply.send(self.sim.add_client_with_sizes(sizes));
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.sim.snapshot());
            }
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.sim.snapshot());
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
