use async_trait::async_trait;

/// Best-effort single-active-instance gating across replicated processes.
///
/// The manager calls [`try_lock`](DistributedLock::try_lock) once on start
/// and then on a fixed refresh cadence
/// ([`CronConfig::lock_refresh_secs`](crate::CronConfig), 60s by default).
/// Implementations should attach a TTL to the underlying lock so that a
/// crashed holder's lock expires even when
/// [`try_unlock`](DistributedLock::try_unlock) is never called.
///
/// Lock failures are never fatal to the scheduler: while the lock is not
/// held, job runs on this instance are skipped, nothing else.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Attempt to acquire (or refresh) the lock.
    async fn try_lock(&self) -> anyhow::Result<()>;

    /// Best-effort release of the lock.
    async fn try_unlock(&self) -> anyhow::Result<()>;

    /// Whether this process currently holds the lock.
    ///
    /// Consulted on every job firing; must be cheap and non-blocking.
    /// Return the outcome of the most recent poll, not a fresh remote check.
    fn has_lock(&self) -> bool;
}
