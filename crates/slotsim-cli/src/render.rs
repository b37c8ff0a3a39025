//! Plain-text rendering of simulation snapshots for the terminal.

use slotsim_scheduler::{Completion, Snapshot};

const BAR_WIDTH: usize = 20;

/// One line per slot followed by the client table.
pub fn snapshot_table(snap: &Snapshot) -> String {
    let mut out = format!(
        "── tick {} (t={:.1}s, {} clients) ──\n",
        snap.tick,
        snap.now_ms as f64 / 1000.0,
        snap.clients.len()
    );

    for slot in &snap.slots {
        match slot.job {
            Some(job) => out.push_str(&format!(
                "slot {}: [{}] {:>3}%  {} (client {}, job {})\n",
                slot.id,
                progress_bar(slot.progress),
                slot.progress,
                job.size,
                job.client_id,
                job.job_id
            )),
            None => out.push_str(&format!("slot {}: waiting for a job\n", slot.id)),
        }
    }

    if !snap.clients.is_empty() {
        out.push_str(&format!("{:>8}  {:>10}  files\n", "client", "waiting"));
    }
    for client in &snap.clients {
        let files: Vec<String> = client
            .jobs
            .iter()
            .map(|j| {
                if j.in_progress {
                    format!("{} (in progress)", j.display)
                } else {
                    j.display.clone()
                }
            })
            .collect();
        out.push_str(&format!(
            "{:>8}  {:>9.2}s  {}\n",
            client.id,
            client.waiting_secs,
            files.join(", ")
        ));
    }
    out
}

pub fn completion_line(done: &Completion) -> String {
    format!(
        "✓ client {} finished job {} ({})",
        done.client_id, done.job_id, done.size
    )
}

fn progress_bar(progress: u8) -> String {
    let filled = (progress as usize * BAR_WIDTH) / 100;
    format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}
