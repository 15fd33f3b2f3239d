//! Backend abstraction for queue storage.
//!
//! A [`QueueBackend`] is the engine's only view of where work comes from and
//! where results go. The bundled [`crate::DiskBackend`] coordinates through
//! a shared filesystem; a database- or broker-backed implementation plugs in
//! through the same trait and the [`crate::registry`].

use async_trait::async_trait;

use crate::error::Result;
use crate::item::WorkItem;
use crate::stats::TimerSnapshot;

/// Source and sink of work items.
///
/// The backend alone understands the storage layout; the engine alone
/// understands polling policy. Implementations must be thread-safe
/// (Send + Sync) even though the engine itself is single-task, because
/// backends may be shared with feeder or monitoring code.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// True when the engine should stop.
    ///
    /// Infallible by design: an error while checking must be swallowed by
    /// the implementation and reported as "keep running", so a transient
    /// storage hiccup never shuts a worker down.
    async fn quit_requested(&self) -> bool;

    /// True when the destination backlog is at or above capacity.
    ///
    /// This is a soft, advisory check. Concurrent workers may all see "not
    /// full" and collectively overshoot the limit; that is accepted
    /// behavior, not a bug.
    async fn destination_is_full(&self) -> Result<bool>;

    /// Claim the next pending item, if any.
    ///
    /// Claiming must guarantee that no other worker can hold the same item
    /// concurrently. Losing a claim race to another worker is not an error
    /// and must not surface as one.
    async fn claim_next(&self) -> Result<Option<WorkItem>>;

    /// Durably publish `result` for a claimed item and release the claim.
    ///
    /// The result must be visible downstream before the source-side claim is
    /// released, so a crash in between causes reprocessing, never loss.
    async fn commit(&self, item: &WorkItem, result: &[u8]) -> Result<()>;

    /// Record that processing a claimed item failed.
    ///
    /// First failure makes the item eligible for exactly one retry; failure
    /// of a retried item abandons it permanently with an operator-visible
    /// marker.
    async fn fail(&self, item: &WorkItem) -> Result<()>;

    /// Persist the engine's cumulative timer snapshot for external
    /// monitoring. A no-op when the backend has no timer location
    /// configured.
    async fn save_timers(&self, timers: &TimerSnapshot) -> Result<()>;
}

/// A type-erased backend, as produced by the [`crate::registry`].
pub type DynBackend = Box<dyn QueueBackend>;

#[async_trait]
impl QueueBackend for Box<dyn QueueBackend> {
    async fn quit_requested(&self) -> bool {
        (**self).quit_requested().await
    }

    async fn destination_is_full(&self) -> Result<bool> {
        (**self).destination_is_full().await
    }

    async fn claim_next(&self) -> Result<Option<WorkItem>> {
        (**self).claim_next().await
    }

    async fn commit(&self, item: &WorkItem, result: &[u8]) -> Result<()> {
        (**self).commit(item, result).await
    }

    async fn fail(&self, item: &WorkItem) -> Result<()> {
        (**self).fail(item).await
    }

    async fn save_timers(&self, timers: &TimerSnapshot) -> Result<()> {
        (**self).save_timers(timers).await
    }
}
