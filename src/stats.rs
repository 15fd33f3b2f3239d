//! Cumulative engine timers, persisted for external monitoring.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A snapshot of where the engine's wall-clock time has gone.
///
/// Counters accumulate monotonically over the life of the process. The
/// engine rewrites the snapshot atomically on every loop iteration, so an
/// external monitor only ever sees the latest complete state; there is no
/// historical log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    /// Time spent inside `Processor::process`.
    pub work: Duration,
    /// Time slept because no work was available.
    pub wait: Duration,
    /// Time slept because the destination was full.
    pub block: Duration,
    /// Everything else: directory scans, renames, bookkeeping.
    pub overhead: Duration,
    /// Items successfully processed and committed.
    pub items: u64,
}

impl TimerSnapshot {
    /// Render as one `Label<TAB>Value` line per counter, durations in
    /// integer milliseconds. This is the on-disk format monitors consume.
    pub fn render(&self) -> String {
        format!(
            "Work\t{}\nWait\t{}\nBlock\t{}\nOverhead\t{}\nItems\t{}\n",
            self.work.as_millis(),
            self.wait.as_millis(),
            self.block.as_millis(),
            self.overhead.as_millis(),
            self.items,
        )
    }
}
