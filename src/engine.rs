//! The queue engine: backend-agnostic polling, backoff, and failure
//! containment.
//!
//! One engine runs one loop on one task; it sleeps rather than spins when
//! idle, and horizontal scale comes only from running more OS processes with
//! distinct worker tags against the same directories. The engine knows the
//! polling policy and nothing else; the backend knows the storage layout and
//! nothing else.

use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::time::sleep;

use crate::backend::QueueBackend;
use crate::config::BackoffConfig;
use crate::item::WorkItem;
use crate::processor::Processor;
use crate::stats::TimerSnapshot;

/// Adaptive sleep interval used when no work is available.
///
/// Ramps up linearly with consecutive empty polls, capped at the configured
/// maximum, and snaps back to the minimum the moment an item is processed.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    config: BackoffConfig,
}

impl Backoff {
    /// Create a backoff starting at the configured minimum.
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            current: config.min,
            config,
        }
    }

    /// The interval to sleep right now.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Ramp up after an empty poll.
    pub fn ramp(&mut self) {
        self.current = (self.current + self.config.step).min(self.config.max);
    }

    /// Snap back to the minimum after useful work.
    pub fn reset(&mut self) {
        self.current = self.config.min;
    }
}

/// The scheduling loop driving a [`QueueBackend`] and a [`Processor`].
pub struct QueueEngine<B, P> {
    backend: B,
    processor: P,
    backoff: Backoff,
    timers: TimerSnapshot,
}

impl<B, P> QueueEngine<B, P>
where
    B: QueueBackend,
    P: Processor,
{
    /// Create an engine with the default backoff policy.
    pub fn new(backend: B, processor: P) -> Self {
        Self::with_backoff(backend, processor, BackoffConfig::default())
    }

    /// Create an engine with an explicit backoff policy.
    pub fn with_backoff(backend: B, processor: P, backoff: BackoffConfig) -> Self {
        Self {
            backend,
            processor,
            backoff: Backoff::new(backoff),
            timers: TimerSnapshot::default(),
        }
    }

    /// The cumulative timers accumulated so far.
    pub fn timers(&self) -> &TimerSnapshot {
        &self.timers
    }

    /// Run until the backend reports quit.
    ///
    /// No failure escapes this loop: backend errors, processor errors, and
    /// processor panics are all logged and treated as "no useful work this
    /// iteration". The only exit is a positive quit signal.
    pub async fn run(&mut self) {
        tracing::info!("queue engine started");

        loop {
            let iteration_started = Instant::now();
            let mut classified = Duration::ZERO;

            if let Err(e) = self.backend.save_timers(&self.timers).await {
                tracing::warn!(error = %e, "failed to persist timer snapshot");
            }

            if self.backend.quit_requested().await {
                tracing::info!(
                    items = self.timers.items,
                    "quit requested, queue engine stopping"
                );
                return;
            }

            match self.backend.destination_is_full().await {
                Ok(true) => {
                    classified += self.pause_blocked().await;
                }
                Ok(false) => match self.backend.claim_next().await {
                    Ok(Some(item)) => {
                        classified += self.process_item(item).await;
                    }
                    Ok(None) => {
                        classified += self.pause_idle().await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "claim failed");
                        classified += self.pause_idle().await;
                    }
                },
                Err(e) => {
                    tracing::error!(error = %e, "backpressure check failed");
                    classified += self.pause_idle().await;
                }
            }

            self.timers.overhead += iteration_started.elapsed().saturating_sub(classified);
        }
    }

    /// Run the processor on a claimed item, containing errors and panics,
    /// and commit or fail it. Returns the wall-clock time classified as
    /// work.
    async fn process_item(&mut self, item: WorkItem) -> Duration {
        tracing::debug!(item_id = %item.id, retry = item.retry, "processing item");

        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.processor.process(&item))
            .catch_unwind()
            .await;
        let elapsed = started.elapsed();
        self.timers.work += elapsed;
        self.backoff.reset();

        match outcome {
            Ok(Ok(result)) => match self.backend.commit(&item, &result).await {
                Ok(()) => {
                    self.timers.items += 1;
                    tracing::debug!(item_id = %item.id, "item committed");
                }
                Err(e) => {
                    tracing::error!(item_id = %item.id, error = %e, "commit failed");
                    self.fail_item(&item).await;
                }
            },
            Ok(Err(e)) => {
                tracing::error!(item_id = %item.id, error = %e, "processor reported failure");
                self.fail_item(&item).await;
            }
            Err(_) => {
                tracing::error!(item_id = %item.id, "processor panicked");
                self.fail_item(&item).await;
            }
        }

        elapsed
    }

    /// Route an item into the failure path. Failures while failing are
    /// logged and swallowed; they must never take the loop down.
    async fn fail_item(&mut self, item: &WorkItem) {
        if let Err(e) = self.backend.fail(item).await {
            tracing::error!(item_id = %item.id, error = %e, "failure handling itself failed");
        }
    }

    /// Sleep because no work is available; counts as wait time and ramps
    /// the backoff.
    async fn pause_idle(&mut self) -> Duration {
        let started = Instant::now();
        sleep(self.backoff.current()).await;
        let elapsed = started.elapsed();
        self.timers.wait += elapsed;
        self.backoff.ramp();
        elapsed
    }

    /// Sleep because the destination is full; counts as blocked time.
    async fn pause_blocked(&mut self) -> Duration {
        let started = Instant::now();
        sleep(self.backoff.current()).await;
        let elapsed = started.elapsed();
        self.timers.block += elapsed;
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{QueueError, Result};
    use crate::processor::{ProcessError, ProcessorFn};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_backoff_ramps_and_caps() {
        let mut backoff = Backoff::new(BackoffConfig::default());
        let mut observed = Vec::new();
        for _ in 0..3 {
            observed.push(backoff.current().as_millis());
            backoff.ramp();
        }
        assert_eq!(observed, vec![10, 110, 210]);

        for _ in 0..100 {
            backoff.ramp();
        }
        assert_eq!(backoff.current(), Duration::from_millis(5000));
    }

    #[test]
    fn test_backoff_resets_to_minimum() {
        let mut backoff = Backoff::new(BackoffConfig::default());
        backoff.ramp();
        backoff.ramp();
        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_millis(10));
    }

    /// In-memory backend scripting a fixed number of engine iterations.
    #[derive(Default)]
    struct ScriptedBackend {
        items: Mutex<Vec<WorkItem>>,
        committed: Mutex<Vec<(String, Vec<u8>)>>,
        failed: Mutex<Vec<String>>,
        snapshots: AtomicUsize,
        quit_checks_left: AtomicUsize,
        full_polls: AtomicUsize,
        fail_commits: bool,
    }

    impl ScriptedBackend {
        fn with_iterations(iterations: usize) -> Self {
            Self {
                quit_checks_left: AtomicUsize::new(iterations),
                ..Default::default()
            }
        }

        fn push(&self, id: &str, payload: &[u8]) {
            self.items
                .lock()
                .unwrap()
                .push(WorkItem::new(id, payload.to_vec()));
        }

        fn committed_ids(&self) -> Vec<String> {
            self.committed
                .lock()
                .unwrap()
                .iter()
                .map(|(id, _)| id.clone())
                .collect()
        }
    }

    #[async_trait]
    impl QueueBackend for ScriptedBackend {
        async fn quit_requested(&self) -> bool {
            let left = self.quit_checks_left.load(Ordering::SeqCst);
            if left == 0 {
                true
            } else {
                self.quit_checks_left.store(left - 1, Ordering::SeqCst);
                false
            }
        }

        async fn destination_is_full(&self) -> Result<bool> {
            let left = self.full_polls.load(Ordering::SeqCst);
            if left == 0 {
                Ok(false)
            } else {
                self.full_polls.store(left - 1, Ordering::SeqCst);
                Ok(true)
            }
        }

        async fn claim_next(&self) -> Result<Option<WorkItem>> {
            let mut items = self.items.lock().unwrap();
            if items.is_empty() {
                Ok(None)
            } else {
                Ok(Some(items.remove(0)))
            }
        }

        async fn commit(&self, item: &WorkItem, result: &[u8]) -> Result<()> {
            if self.fail_commits {
                return Err(QueueError::Backend("commit rejected".to_string()));
            }
            self.committed
                .lock()
                .unwrap()
                .push((item.id.clone(), result.to_vec()));
            Ok(())
        }

        async fn fail(&self, item: &WorkItem) -> Result<()> {
            self.failed.lock().unwrap().push(item.id.clone());
            Ok(())
        }

        async fn save_timers(&self, _timers: &TimerSnapshot) -> Result<()> {
            self.snapshots.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_backoff() -> BackoffConfig {
        BackoffConfig {
            min: Duration::from_millis(1),
            max: Duration::from_millis(5),
            step: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_engine_commits_successful_items() {
        let backend = ScriptedBackend::with_iterations(5);
        backend.push("a", b"1");
        backend.push("b", b"2");

        let processor =
            ProcessorFn(|item: WorkItem| async move { Ok(item.payload.repeat(2)) });
        let mut engine = QueueEngine::with_backoff(backend, processor, fast_backoff());
        engine.run().await;

        assert_eq!(engine.backend.committed_ids(), vec!["a", "b"]);
        assert_eq!(
            engine.backend.committed.lock().unwrap()[0].1,
            b"11".to_vec()
        );
        assert!(engine.backend.failed.lock().unwrap().is_empty());
        assert_eq!(engine.timers.items, 2);
        // A snapshot is persisted on every iteration, including the final
        // quit iteration.
        assert_eq!(engine.backend.snapshots.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_engine_routes_processor_errors_to_fail() {
        let backend = ScriptedBackend::with_iterations(3);
        backend.push("bad", b"1");

        let processor = ProcessorFn(|_item: WorkItem| async move {
            Err(ProcessError::new("parser exploded"))
        });
        let mut engine = QueueEngine::with_backoff(backend, processor, fast_backoff());
        engine.run().await;

        assert!(engine.backend.committed_ids().is_empty());
        assert_eq!(*engine.backend.failed.lock().unwrap(), vec!["bad"]);
        assert_eq!(engine.timers.items, 0);
    }

    #[tokio::test]
    async fn test_engine_survives_processor_panics() {
        let backend = ScriptedBackend::with_iterations(4);
        backend.push("boom", b"1");
        backend.push("ok", b"2");

        let processor = ProcessorFn(|item: WorkItem| async move {
            if item.id == "boom" {
                panic!("unrecoverable parser state");
            }
            Ok(item.payload)
        });
        let mut engine = QueueEngine::with_backoff(backend, processor, fast_backoff());
        engine.run().await;

        // The panic was contained: the item failed, the loop went on to
        // process the next one.
        assert_eq!(*engine.backend.failed.lock().unwrap(), vec!["boom"]);
        assert_eq!(engine.backend.committed_ids(), vec!["ok"]);
    }

    #[tokio::test]
    async fn test_engine_fails_item_when_commit_fails() {
        let backend = ScriptedBackend {
            quit_checks_left: AtomicUsize::new(2),
            fail_commits: true,
            ..Default::default()
        };
        backend.push("a", b"1");

        let processor = ProcessorFn(|item: WorkItem| async move { Ok(item.payload) });
        let mut engine = QueueEngine::with_backoff(backend, processor, fast_backoff());
        engine.run().await;

        assert_eq!(*engine.backend.failed.lock().unwrap(), vec!["a"]);
        assert_eq!(engine.timers.items, 0);
    }

    #[tokio::test]
    async fn test_engine_blocks_while_destination_is_full() {
        let backend = ScriptedBackend {
            quit_checks_left: AtomicUsize::new(3),
            full_polls: AtomicUsize::new(2),
            ..Default::default()
        };

        let processor = ProcessorFn(|item: WorkItem| async move { Ok(item.payload) });
        let mut engine = QueueEngine::with_backoff(backend, processor, fast_backoff());
        engine.run().await;

        assert!(engine.timers.block > Duration::ZERO);
        assert_eq!(engine.timers.items, 0);
    }

    #[tokio::test]
    async fn test_empty_polls_ramp_backoff_and_work_resets_it() {
        let backend = ScriptedBackend::with_iterations(3);
        let processor = ProcessorFn(|item: WorkItem| async move { Ok(item.payload) });
        let mut engine = QueueEngine::with_backoff(backend, processor, fast_backoff());
        engine.run().await;

        // Three empty polls: 1ms + 1ms step each.
        assert_eq!(engine.backoff.current(), Duration::from_millis(4));
        assert!(engine.timers.wait > Duration::ZERO);

        engine.backend.quit_checks_left.store(2, Ordering::SeqCst);
        engine.backend.push("a", b"1");
        engine.run().await;
        // Processing an item snapped the interval back to the minimum, then
        // one trailing empty poll ramped it once.
        assert_eq!(engine.backoff.current(), Duration::from_millis(2));
        assert_eq!(engine.timers.items, 1);
    }
}
