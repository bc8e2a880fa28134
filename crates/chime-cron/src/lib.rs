//! `chime-cron` — named cron jobs on a Tokio dispatch loop, with optional
//! distributed-lock gating for replicated deployments.
//!
//! # Overview
//!
//! A [`CronManager`] keeps an in-memory, name-keyed registry of jobs and
//! drives them through a single dispatch loop ([`engine::Engine`]). The loop
//! sleeps until the earliest due instant, fires every due entry in its own
//! task, recomputes next-due instants and repeats until stopped. Jobs can be
//! added, removed, paused and resumed at runtime; nothing is persisted — the
//! registry is rebuilt from caller registrations at process start.
//!
//! When a [`DistributedLock`] coordinator is installed, every firing first
//! checks a cheap local "do I hold the lock" flag and skips the run
//! otherwise, so at most one replica executes jobs at a time (best-effort,
//! TTL-backed — this crate consumes the lock abstraction, it does not
//! provide one).
//!
//! # Schedule forms
//!
//! | Form          | Example            | Behaviour                          |
//! |---------------|--------------------|------------------------------------|
//! | six-field cron| `0 30 3 * * *`     | sec min hour dom month dow, in UTC |
//! | named shortcut| `@daily`           | `@yearly` … `@hourly`              |
//! | interval      | `@every 90s`       | fixed gap between firings          |
//!
//! # Example
//!
//! ```rust,ignore
//! use chime_cron::{CronConfig, CronManager};
//!
//! let manager = CronManager::new(CronConfig::default());
//! manager.add("heartbeat", "@every 15s", || async {
//!     tracing::info!("hello from heartbeat");
//!     Ok(())
//! })?;
//!
//! manager.start().await;
//! // ... later:
//! manager.pause("heartbeat")?;
//! manager.resume("heartbeat")?;
//! manager.stop().await;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod lock;
pub mod manager;
pub mod schedule;
pub mod types;

pub use config::CronConfig;
pub use engine::{Engine, JobFn};
pub use error::{CronError, Result};
pub use lock::DistributedLock;
pub use manager::CronManager;
pub use schedule::Schedule;
pub use types::{EntryId, Job};
