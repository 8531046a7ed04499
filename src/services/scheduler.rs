//! Coalescing autosave scheduler.
//!
//! One task per map session absorbs both "zone edited" triggers and the
//! periodic sweep. Each zone edit re-arms that zone's deadline rather than
//! stacking timers; when a deadline passes the zone gets a live save. Saves
//! run on their own tasks so a slow store never delays deadlines or ticks,
//! and the engine's class locks drop overlapping attempts.
//!
//! Dropping the [`Scheduler`] stops the task and discards pending deadlines.
//! Saves already started are left to finish.

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_test;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use canvas::doc::ZoneId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::autosave::{Autosave, SweepOutcome};

#[derive(Debug)]
enum Command {
    ZoneEdited(ZoneId),
    Forget(ZoneId),
    SweepNow,
}

pub struct Scheduler {
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl Scheduler {
    /// Spawn the scheduler task for one session.
    #[must_use]
    pub fn spawn(autosave: Arc<Autosave>, debounce: Duration, sweep_interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        info!(
            debounce_ms = u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX),
            sweep_secs = sweep_interval.as_secs(),
            "autosave scheduler started"
        );
        let task = tokio::spawn(run(autosave, rx, debounce, sweep_interval));
        Self { tx, task }
    }

    /// Re-arm the live-save deadline for `id`.
    pub fn zone_edited(&self, id: ZoneId) {
        self.send(Command::ZoneEdited(id));
    }

    /// Drop any pending live save for `id`.
    pub fn forget_zone(&self, id: ZoneId) {
        self.send(Command::Forget(id));
    }

    /// Run a sweep now instead of waiting for the next tick.
    pub fn sweep_now(&self) {
        self.send(Command::SweepNow);
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            debug!("autosave scheduler is stopped");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.task.abort();
        debug!("autosave scheduler stopped");
    }
}

async fn run(
    autosave: Arc<Autosave>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    debounce: Duration,
    sweep_interval: Duration,
) {
    let mut deadlines: HashMap<ZoneId, Instant> = HashMap::new();
    let mut ticker = tokio::time::interval_at(Instant::now() + sweep_interval, sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let next_deadline = deadlines.values().min().copied();

        tokio::select! {
            maybe_command = rx.recv() => {
                match maybe_command {
                    Some(Command::ZoneEdited(id)) => {
                        deadlines.insert(id, Instant::now() + debounce);
                    }
                    Some(Command::Forget(id)) => {
                        deadlines.remove(&id);
                    }
                    Some(Command::SweepNow) => spawn_sweep(&autosave),
                    None => break,
                }
            }
            _ = ticker.tick() => spawn_sweep(&autosave),
            () = sleep_until_next(next_deadline), if next_deadline.is_some() => {
                let now = Instant::now();
                let due: Vec<ZoneId> = deadlines.iter().filter(|(_, at)| **at <= now).map(|(id, _)| *id).collect();
                for id in due {
                    deadlines.remove(&id);
                    spawn_live_save(&autosave, id);
                }
            }
        }
    }
}

async fn sleep_until_next(deadline: Option<Instant>) {
    if let Some(at) = deadline {
        tokio::time::sleep_until(at).await;
    }
}

fn spawn_live_save(autosave: &Arc<Autosave>, id: ZoneId) {
    let autosave = Arc::clone(autosave);
    tokio::spawn(async move {
        if let Ok(outcome) = autosave.live_save_zone(id).await {
            debug!(zone_id = %id, ?outcome, "live save finished");
        }
    });
}

fn spawn_sweep(autosave: &Arc<Autosave>) {
    let autosave = Arc::clone(autosave);
    tokio::spawn(async move {
        if let SweepOutcome::Aborted(e) = autosave.sweep().await {
            info!(error = %e, "sweep aborted");
        }
    });
}
