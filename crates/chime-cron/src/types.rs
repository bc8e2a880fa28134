use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schedule::Schedule;

/// Identity of a scheduled entry inside the engine.
///
/// Assigned from a monotonically increasing counter at insertion time; a job
/// that is paused and resumed gets a fresh id for its new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point-in-time snapshot of a registered job, as returned by
/// [`CronManager::info`](crate::CronManager::info).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job name.
    pub name: String,
    /// Schedule expression text the job was registered with.
    pub plan: String,
    /// Engine entry currently backing the job; `None` while paused.
    pub entry_id: Option<EntryId>,
    /// Whether the job is suspended.
    pub paused: bool,
}

impl Job {
    /// Compute the next `n` firing instants for this job's plan, starting
    /// from now.
    ///
    /// Read-only inspection: works the same whether the job is scheduled or
    /// paused, and has no effect on the engine. May return fewer than `n`
    /// instants for a plan that runs out (e.g. a year-bounded expression).
    pub fn next(&self, n: usize) -> Result<Vec<DateTime<Utc>>> {
        let schedule: Schedule = self.plan.parse()?;

        let mut instants = Vec::with_capacity(n);
        let mut last = Utc::now();
        for _ in 0..n {
            match schedule.next_after(last) {
                Some(t) => {
                    instants.push(t);
                    last = t;
                }
                None => break,
            }
        }
        Ok(instants)
    }
}
