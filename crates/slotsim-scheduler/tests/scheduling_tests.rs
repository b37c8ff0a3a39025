// End-to-end behaviour of the synchronous simulation core.

use std::collections::HashSet;

use slotsim_core::{ClientId, SimConfig};
use slotsim_scheduler::{
    priority::PriorityScheduler, slots::step_ms, state::SchedulerState, SchedulerError,
    SimEvent, Simulation, Size,
};

fn config(slots: usize, tick_ms: u64, seed: u64) -> SimConfig {
    SimConfig {
        slots,
        tick_ms,
        seed: Some(seed),
        ..SimConfig::default()
    }
}

#[test]
fn smaller_job_is_scheduled_first_when_waiting_is_equal() {
    let mut sim = Simulation::new(config(1, 500, 1)).unwrap();
    sim.start();
    let (big, _) = sim.add_client_with_sizes(vec![Size(10_000_000_000)]).unwrap();
    let (small, _) = sim.add_client_with_sizes(vec![Size(10_000_000)]).unwrap();

    let report = sim.tick();
    assert_eq!(report.assigned.len(), 1);
    assert_eq!(report.assigned[0].1.client_id, small);
    assert_ne!(report.assigned[0].1.client_id, big);
}

#[test]
fn long_waiting_client_overtakes_smaller_newcomer() {
    let mut sim = Simulation::new(config(1, 1_000, 1)).unwrap();
    sim.start();
    // Occupy the only slot for a while with a 100 GB job (3 s simulated).
    sim.add_client_with_sizes(vec![Size(100_000_000_000)]).unwrap();
    sim.tick();
    let (veteran, _) = sim.add_client_with_sizes(vec![Size(50_000_000)]).unwrap();
    sim.tick();
    sim.tick();
    let (newcomer, _) = sim.add_client_with_sizes(vec![Size(1_000)]).unwrap();

    // The 100 GB job finishes on the fourth tick; both candidates compete.
    let mut winner = None;
    for _ in 0..4 {
        let report = sim.tick();
        if let Some((_, job)) = report.assigned.first() {
            winner = Some(job.client_id);
            break;
        }
    }
    // waiting term: veteran has >= 2 s over the newcomer, size terms are < 0.01
    assert_eq!(winner, Some(veteran));
    assert_ne!(winner, Some(newcomer));
}

#[test]
fn no_job_is_ever_bound_to_two_slots() {
    let mut sim = Simulation::new(config(5, 500, 99)).unwrap();
    sim.start();
    for tick in 0..400 {
        if tick % 3 == 0 {
            sim.add_client().unwrap();
        }
        sim.tick();

        let in_flight = sim.in_flight();
        let unique: HashSet<_> = in_flight.iter().map(|j| j.job_id).collect();
        assert_eq!(unique.len(), in_flight.len(), "duplicate binding at tick {tick}");
        sim.state().check_invariants().unwrap();
    }
}

#[test]
fn completed_jobs_leave_their_clients() {
    let mut sim = Simulation::new(config(2, 500, 3)).unwrap();
    let mut rx = sim.subscribe();
    sim.start();
    let (client, jobs) = sim
        .add_client_with_sizes(vec![Size(2_000), Size(4_000), Size(8_000)])
        .unwrap();

    let mut completed = Vec::new();
    for _ in 0..10 {
        sim.tick();
        while let Ok(ev) = rx.try_recv() {
            if let SimEvent::JobCompleted(done) = ev {
                completed.push(done.job_id);
                let remaining = sim.state().queue.client(done.client_id);
                assert!(remaining.map_or(true, |c| c.jobs.iter().all(|j| j.id != done.job_id)));
            }
        }
    }
    let mut expected: Vec<_> = jobs.iter().map(|j| j.id).collect();
    completed.sort();
    expected.sort();
    assert_eq!(completed, expected);
    assert!(sim.state().queue.client(client).is_none());
    assert!(sim.snapshot().clients.is_empty());
}

#[test]
fn completing_twice_changes_nothing() {
    let mut state = SchedulerState::new(1);
    let (client, jobs) = state.add_client(&[Size(1_000), Size(2_000)]);
    assert!(state.queue.complete_job(client, jobs[0].id));

    let before: Vec<_> = state.queue.clients().cloned().collect();
    assert!(!state.queue.complete_job(client, jobs[0].id));
    let after: Vec<_> = state.queue.clients().cloned().collect();
    assert_eq!(before, after);
}

#[test]
fn stale_assignment_is_skipped_and_reselected() {
    let mut state = SchedulerState::new(2);
    let (a, a_jobs) = state.add_client(&[Size(1_000)]);
    let (_b, b_jobs) = state.add_client(&[Size(2_000)]);
    let scheduler = PriorityScheduler::default();

    let plan = scheduler.plan(&state);
    assert_eq!(plan.len(), 2);

    // The planned job for client `a` disappears before the plan is applied.
    assert!(state.queue.complete_job(a, a_jobs[0].id));
    let err = scheduler.apply(&mut state, &plan[0], 1).unwrap_err();
    assert!(matches!(err, SchedulerError::StaleReference { .. }));

    // A full pass recovers and fills a slot with what is left.
    let applied = scheduler.fill_slots(&mut state, 1);
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].job.job_id, b_jobs[0].id);
    state.check_invariants().unwrap();
}

#[test]
fn empty_queue_assigns_nothing() {
    let mut sim = Simulation::new(config(5, 500, 1)).unwrap();
    sim.start();
    let report = sim.tick();
    assert!(report.assigned.is_empty());
    assert!(report.completed.is_empty());
    assert!(sim.snapshot().slots.iter().all(|s| s.job.is_none()));
}

#[test]
fn hundred_gb_job_takes_hundred_thirty_ms_steps() {
    let size = Size(100_000_000_000);
    assert_eq!(step_ms(size), 30.0);

    let mut sim = Simulation::new(config(1, 30, 1)).unwrap();
    sim.start();
    sim.add_client_with_sizes(vec![size]).unwrap();
    assert_eq!(sim.tick().assigned.len(), 1);

    for step in 1..100u8 {
        assert!(sim.tick().completed.is_empty());
        assert_eq!(sim.snapshot().slots[0].progress, step);
    }
    let report = sim.tick();
    assert_eq!(report.completed.len(), 1);
    assert!(sim.snapshot().slots[0].job.is_none());
}

#[test]
fn snapshot_marks_in_progress_jobs() {
    let mut sim = Simulation::new(config(1, 500, 1)).unwrap();
    sim.start();
    sim.add_client_with_sizes(vec![Size(500_000_000_000), Size(900_000_000_000)])
        .unwrap();
    sim.tick();

    let snap = sim.snapshot();
    assert_eq!(snap.clients.len(), 1);
    let client = &snap.clients[0];
    assert_eq!(client.id, ClientId(1));
    assert!(client.jobs[0].in_progress);
    assert!(!client.jobs[1].in_progress);
    assert_eq!(client.jobs[0].display, "500.00 GB");
    assert_eq!(snap.slots[0].job.unwrap().size, Size(500_000_000_000));

    let json = serde_json::to_value(SimEvent::Tick(snap)).unwrap();
    assert_eq!(json["event"], "tick");
    assert_eq!(json["state"], "running");
}
