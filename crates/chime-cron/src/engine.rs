use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;
use crate::schedule::Schedule;
use crate::types::EntryId;

/// Type-erased scheduled action. Each firing gets a fresh future; the engine
/// never awaits it inline — every invocation runs in its own task.
pub type JobFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Sleep horizon when no entries are scheduled; insertions wake the loop
/// through the notifier long before this elapses.
const IDLE_SLEEP: StdDuration = StdDuration::from_secs(24 * 60 * 60);

struct Entry {
    id: EntryId,
    next: DateTime<Utc>,
    schedule: Schedule,
    action: JobFn,
}

struct Shared {
    entries: Mutex<Vec<Entry>>,
    /// Woken on insert/remove so the loop recomputes its sleep target.
    wake: Notify,
}

/// Time-driven dispatch engine.
///
/// Owns a set of entries, each with a next-due instant. A single loop task
/// sleeps until the earliest due instant (or a mutation), fires every due
/// entry concurrently, recomputes their next instants and goes back to
/// sleep. Actions are infallible from the engine's point of view; failure
/// handling belongs to whoever built the [`JobFn`].
pub struct Engine {
    shared: Arc<Shared>,
    next_id: AtomicU64,
    loop_task: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(Vec::new()),
                wake: Notify::new(),
            }),
            next_id: AtomicU64::new(0),
            loop_task: Mutex::new(None),
            shutdown_tx: Mutex::new(None),
        }
    }

    /// Parse `spec` and schedule `action` under a fresh entry id.
    ///
    /// If the dispatch loop is asleep on a later instant it is woken so the
    /// new entry cannot be overslept.
    pub fn add_fn(&self, spec: &str, action: JobFn) -> Result<EntryId> {
        let schedule: Schedule = spec.parse()?;
        // Parsing rejects specs with no future occurrence, but a year-bounded
        // plan re-added later (pause/resume) may have run out since.
        let next = schedule.next_after(Utc::now()).ok_or_else(|| {
            crate::error::CronError::InvalidSchedule(format!("[{spec}]: no future occurrence"))
        })?;

        let id = EntryId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.shared.entries.lock().unwrap().push(Entry {
            id,
            next,
            schedule,
            action,
        });
        self.shared.wake.notify_one();

        debug!(entry = %id, %spec, next = %next, "entry scheduled");
        Ok(id)
    }

    /// Remove an entry. Unknown ids are tolerated — removal may race with a
    /// firing that already dropped an exhausted entry.
    pub fn remove(&self, id: EntryId) {
        let mut entries = self.shared.entries.lock().unwrap();
        if let Some(index) = entries.iter().position(|e| e.id == id) {
            entries.remove(index);
            debug!(entry = %id, "entry removed");
        }
        drop(entries);
        self.shared.wake.notify_one();
    }

    /// Spawn the dispatch loop. No-op if it is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut loop_task = self.loop_task.lock().unwrap();
        if loop_task.is_some() {
            return;
        }

        let (tx, rx) = watch::channel(false);
        *self.shutdown_tx.lock().unwrap() = Some(tx);
        *loop_task = Some(tokio::spawn(run_loop(Arc::clone(&self.shared), rx)));
    }

    /// Halt the dispatch loop and wait for it to exit.
    ///
    /// Actions already dispatched keep running to completion; no entry fires
    /// after this returns. No-op if the loop is not running.
    pub async fn stop(&self) {
        let Some(task) = self.loop_task.lock().unwrap().take() else {
            return;
        };
        if let Some(tx) = self.shutdown_tx.lock().unwrap().take() {
            let _ = tx.send(true);
        }
        let _ = task.await;
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // The loop task holds its own Arc of the shared state; signal it so
        // a dropped engine does not leave a sleeping task behind.
        if let Some(tx) = self.shutdown_tx.lock().unwrap().take() {
            let _ = tx.send(true);
        }
    }
}

async fn run_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    debug!("dispatch loop started");
    loop {
        let target = {
            let entries = shared.entries.lock().unwrap();
            entries.iter().map(|e| e.next).min()
        };
        let sleep = match target {
            Some(t) => (t - Utc::now()).to_std().unwrap_or(StdDuration::ZERO),
            None => IDLE_SLEEP,
        };

        tokio::select! {
            _ = tokio::time::sleep(sleep) => fire_due(&shared),
            _ = shared.wake.notified() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("dispatch loop stopped");
}

/// Fire every entry due at or before now — each exactly once per tick, even
/// when the process was descheduled past several due instants — and advance
/// their next-due instants.
fn fire_due(shared: &Shared) {
    let now = Utc::now();
    let mut fired: Vec<JobFn> = Vec::new();

    {
        let mut entries = shared.entries.lock().unwrap();
        entries.retain_mut(|entry| {
            if entry.next > now {
                return true;
            }
            fired.push(Arc::clone(&entry.action));
            match entry.schedule.next_after(now) {
                Some(next) => {
                    entry.next = next;
                    true
                }
                None => {
                    warn!(entry = %entry.id, "schedule exhausted, dropping entry");
                    false
                }
            }
        });
    }

    // Dispatch outside the entries lock: one slow action must not delay its
    // siblings or the loop.
    for action in fired {
        tokio::spawn(action());
    }
}
