use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use futures_util::FutureExt;
use tracing::{debug, error, warn};

use crate::config::CronConfig;
use crate::engine::{Engine, JobFn};
use crate::error::{CronError, Result};
use crate::lock::DistributedLock;
use crate::types::{EntryId, Job};

/// The lock coordinator slot is read at every firing, so installing one
/// before `start` is visible to handlers wrapped earlier.
type LockSlot = Arc<RwLock<Option<Arc<dyn DistributedLock>>>>;

struct JobSlot {
    plan: String,
    entry_id: Option<EntryId>,
    paused: bool,
    /// Wrapped closure built once at registration; pause/resume cycles
    /// re-install this exact closure.
    handler: JobFn,
}

/// Named-job registry over the dispatch [`Engine`].
///
/// Jobs are keyed by a unique name and can be added, removed, paused and
/// resumed at runtime. Each registered handler is wrapped with
/// distributed-lock gating, failure containment and duration accounting
/// before it reaches the engine.
pub struct CronManager {
    engine: Engine,
    jobs: RwLock<HashMap<String, JobSlot>>,
    lock: LockSlot,
    refresh_entry: Mutex<Option<EntryId>>,
    config: CronConfig,
}

impl CronManager {
    pub fn new(config: CronConfig) -> Self {
        Self {
            engine: Engine::new(),
            jobs: RwLock::new(HashMap::new()),
            lock: Arc::new(RwLock::new(None)),
            refresh_entry: Mutex::new(None),
            config,
        }
    }

    /// Install a distributed lock coordinator. Call before [`start`](Self::start).
    ///
    /// Without a coordinator every job always executes (single-instance
    /// mode); with one, a job only executes while the lock is held.
    pub fn set_distributed_lock(&self, lock: Arc<dyn DistributedLock>) {
        *self.lock.write().unwrap() = Some(lock);
    }

    /// Register a named job.
    ///
    /// `plan` is a schedule expression (see [`Schedule`](crate::Schedule));
    /// `handler` is a pre-bound async closure. Fails if the name is taken or
    /// the plan does not parse; an existing job is never silently replaced.
    pub fn add<F, Fut>(&self, name: &str, plan: &str, handler: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut jobs = self.jobs.write().unwrap();

        if let Some(existing) = jobs.get(name) {
            return Err(CronError::JobExists {
                name: name.to_string(),
                plan: existing.plan.clone(),
            });
        }

        let wrapped = wrap_handler(name, handler, Arc::clone(&self.lock));
        let id = self.engine.add_fn(plan, Arc::clone(&wrapped))?;

        jobs.insert(
            name.to_string(),
            JobSlot {
                plan: plan.to_string(),
                entry_id: Some(id),
                paused: false,
                handler: wrapped,
            },
        );

        debug!(job = %name, %plan, entry = %id, "job added");
        Ok(())
    }

    /// Unregister a job, paused or not.
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut jobs = self.jobs.write().unwrap();
        let slot = jobs.remove(name).ok_or_else(|| CronError::JobNotFound {
            name: name.to_string(),
        })?;

        if let Some(id) = slot.entry_id {
            self.engine.remove(id);
        }

        debug!(job = %name, "job removed");
        Ok(())
    }

    /// Suspend a job: its engine entry is withdrawn and no further firings
    /// occur until [`resume`](Self::resume). Pausing a paused job is a no-op.
    pub fn pause(&self, name: &str) -> Result<()> {
        let mut jobs = self.jobs.write().unwrap();
        let slot = jobs.get_mut(name).ok_or_else(|| CronError::JobNotFound {
            name: name.to_string(),
        })?;

        if slot.paused {
            return Ok(());
        }

        if let Some(id) = slot.entry_id.take() {
            self.engine.remove(id);
        }
        slot.paused = true;

        debug!(job = %name, "job paused");
        Ok(())
    }

    /// Resume a paused job under a fresh engine entry, reusing the wrapped
    /// handler built at registration. Resuming a running job is a no-op.
    pub fn resume(&self, name: &str) -> Result<()> {
        let mut jobs = self.jobs.write().unwrap();
        let slot = jobs.get_mut(name).ok_or_else(|| CronError::JobNotFound {
            name: name.to_string(),
        })?;

        if !slot.paused {
            return Ok(());
        }

        let id = self.engine.add_fn(&slot.plan, Arc::clone(&slot.handler))?;
        slot.entry_id = Some(id);
        slot.paused = false;

        debug!(job = %name, entry = %id, "job resumed");
        Ok(())
    }

    /// Snapshot a job's current state.
    pub fn info(&self, name: &str) -> Result<Job> {
        let jobs = self.jobs.read().unwrap();
        let slot = jobs.get(name).ok_or_else(|| CronError::JobNotFound {
            name: name.to_string(),
        })?;

        Ok(Job {
            name: name.to_string(),
            plan: slot.plan.clone(),
            entry_id: slot.entry_id,
            paused: slot.paused,
        })
    }

    /// Start dispatching.
    ///
    /// With a lock coordinator installed this first makes an immediate
    /// acquire attempt, then schedules a refresh entry through the same
    /// engine as user jobs (registered once, even across repeated starts).
    pub async fn start(&self) {
        let coordinator = self.lock.read().unwrap().clone();
        if let Some(coordinator) = coordinator {
            if let Err(err) = coordinator.try_lock().await {
                warn!(error = %err, "initial distributed lock attempt failed");
            }
            self.schedule_lock_refresh();
        }

        self.engine.start();
    }

    /// Stop dispatching and release the distributed lock, if any.
    ///
    /// In-flight job runs are left to finish; the lock release is
    /// best-effort — the lock's TTL covers the failure case.
    pub async fn stop(&self) {
        self.engine.stop().await;

        let coordinator = self.lock.read().unwrap().clone();
        if let Some(coordinator) = coordinator {
            if let Err(err) = coordinator.try_unlock().await {
                warn!(error = %err, "distributed lock release failed");
            }
        }
    }

    fn schedule_lock_refresh(&self) {
        let mut refresh_entry = self.refresh_entry.lock().unwrap();
        if refresh_entry.is_some() {
            return;
        }

        let lock = Arc::clone(&self.lock);
        let refresh: JobFn = Arc::new(move || {
            let lock = Arc::clone(&lock);
            Box::pin(async move {
                let Some(coordinator) = lock.read().unwrap().clone() else {
                    return;
                };
                if let Err(err) = coordinator.try_lock().await {
                    warn!(error = %err, "distributed lock refresh failed");
                }
            })
        });

        let plan = format!("@every {}s", self.config.lock_refresh_secs);
        match self.engine.add_fn(&plan, refresh) {
            Ok(id) => *refresh_entry = Some(id),
            Err(err) => error!(error = %err, "failed to schedule distributed lock refresh"),
        }
    }
}

impl Default for CronManager {
    fn default() -> Self {
        Self::new(CronConfig::default())
    }
}

/// Build the closure installed into the engine for a job: lock gate, then
/// the user handler under panic containment, with start/finish/elapsed
/// accounting around it. Handler failures stay here — they never reach the
/// engine or the job's future scheduling.
fn wrap_handler<F, Fut>(name: &str, handler: F, lock: LockSlot) -> JobFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let name: Arc<str> = Arc::from(name);
    let handler = Arc::new(handler);

    Arc::new(move || {
        let name = Arc::clone(&name);
        let handler = Arc::clone(&handler);
        let coordinator = lock.read().unwrap().clone();

        Box::pin(async move {
            if let Some(coordinator) = coordinator {
                if !coordinator.has_lock() {
                    debug!(job = %name, "skipping run: distributed lock not held");
                    return;
                }
            }

            debug!(job = %name, "job running");
            let started = Instant::now();

            match AssertUnwindSafe(handler()).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(job = %name, error = %err, "job failed"),
                Err(panic) => {
                    error!(job = %name, cause = panic_message(&*panic), "job panicked")
                }
            }

            debug!(job = %name, elapsed = ?started.elapsed(), "job finished");
        })
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
