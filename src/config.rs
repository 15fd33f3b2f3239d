//! Configuration types for queue backends and the engine loop.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for a queue backend.
///
/// Immutable after construction; every field maps onto the parameter surface
/// of the original disk queue deployment, so an embedding application can
/// deserialize this straight out of its own settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Directory to claim work from. `None` for pure feeder backends that
    /// only deposit results downstream.
    pub source: Option<PathBuf>,
    /// Directory committed results are deposited into.
    pub destination: PathBuf,
    /// String unique to this running process, embedded in file names to
    /// record which process holds which claim.
    pub worker_tag: String,
    /// Maximum number of not-yet-consumed files at the destination before
    /// backpressure kicks in. 0 means unlimited.
    pub max_destination_files: usize,
    /// Maximum total size in bytes of not-yet-consumed files at the
    /// destination. 0 means unlimited.
    pub max_destination_bytes: u64,
    /// Where to persist the cumulative timer snapshot. `None` disables
    /// timer persistence.
    pub timer_file: Option<PathBuf>,
    /// Path an external orchestrator may create to force shutdown.
    pub quit_file: Option<PathBuf>,
}

impl QueueConfig {
    /// Create a new builder. The destination directory is the only field
    /// with no usable default.
    pub fn builder(destination: impl Into<PathBuf>) -> QueueConfigBuilder {
        QueueConfigBuilder::new(destination)
    }
}

/// Builder for [`QueueConfig`].
#[derive(Debug)]
pub struct QueueConfigBuilder {
    config: QueueConfig,
}

impl QueueConfigBuilder {
    /// Create a new builder with default values.
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            config: QueueConfig {
                source: None,
                destination: destination.into(),
                worker_tag: generate_worker_tag(),
                max_destination_files: 10,
                max_destination_bytes: 0,
                timer_file: None,
                quit_file: None,
            },
        }
    }

    /// Set the source directory.
    pub fn source(mut self, source: impl Into<PathBuf>) -> Self {
        self.config.source = Some(source.into());
        self
    }

    /// Set the worker tag.
    pub fn worker_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.worker_tag = tag.into();
        self
    }

    /// Set the destination file-count limit (0 = unlimited).
    pub fn max_destination_files(mut self, max: usize) -> Self {
        self.config.max_destination_files = max;
        self
    }

    /// Set the destination byte limit (0 = unlimited).
    pub fn max_destination_bytes(mut self, max: u64) -> Self {
        self.config.max_destination_bytes = max;
        self
    }

    /// Set the timer snapshot path.
    pub fn timer_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.timer_file = Some(path.into());
        self
    }

    /// Set the quit file path.
    pub fn quit_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.quit_file = Some(path.into());
        self
    }

    /// Build the QueueConfig.
    pub fn build(self) -> QueueConfig {
        self.config
    }
}

/// Sleep policy for the engine when no work is available or the destination
/// is full.
///
/// The defaults are the tuning the original deployment shipped with. The
/// monotone ramp-up and instant reset behavior is a contract; the exact
/// values are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Sleep after the first empty poll, and after every successful item.
    pub min: Duration,
    /// Upper bound on the sleep interval.
    pub max: Duration,
    /// Added to the interval after each consecutive empty poll.
    pub step: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(10),
            max: Duration::from_millis(5000),
            step: Duration::from_millis(100),
        }
    }
}

/// Generate a worker tag unique to this process.
///
/// Workers sharing queue directories must carry distinct tags; host name
/// plus pid is unique as long as each process builds at most one tag-less
/// config.
pub fn generate_worker_tag() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("-{}-{}", host, std::process::id())
}
