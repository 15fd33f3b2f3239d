//! # dirq - Directory-Backed Work Queue
//!
//! A Rust library for running fleets of independent worker processes over a
//! shared backlog of work items, coordinated entirely through the
//! filesystem: no shared memory, no network RPC, no central coordinator.
//!
//! ## How it works
//!
//! Every queue is a directory, and the status of each item is encoded in
//! its file name (`.ready`, `.working`, `.failed`, ...). Workers claim
//! items with an atomic rename, publish results into a downstream
//! directory with the same rename trick, and retry failed items exactly
//! once. A chain of processing stages is just a chain of directories, with
//! a `done` marker propagating downstream when a stage finishes.
//!
//! Delivery is at-least-once: a worker crash between publishing a result
//! and releasing its claim causes reprocessing, never loss. Horizontal
//! scale comes from running more processes, each with a distinct worker
//! tag, against the same directories.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dirq::{ProcessorFn, QueueConfig, QueueEngine, WorkItem};
//!
//! #[tokio::main]
//! async fn main() -> dirq::Result<()> {
//!     let config = QueueConfig::builder("/data/queue/parsed")
//!         .source("/data/queue/raw")
//!         .quit_file("/data/queue/quit")
//!         .build();
//!     let backend = dirq::registry::build("disk", &config)?;
//!
//!     let processor = ProcessorFn(|item: WorkItem| async move {
//!         // Run the real pipeline step here.
//!         Ok(item.payload)
//!     });
//!
//!     // Blocks until a quit file appears or the upstream stage is done.
//!     QueueEngine::new(backend, processor).run().await;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod disk;
pub mod engine;
pub mod error;
pub mod item;
pub mod processor;
pub mod registry;
pub mod state;
pub mod stats;

// Re-export main types
pub use backend::{DynBackend, QueueBackend};
pub use config::{generate_worker_tag, BackoffConfig, QueueConfig, QueueConfigBuilder};
pub use disk::{enqueue, DiskBackend};
pub use engine::{Backoff, QueueEngine};
pub use error::{QueueError, Result};
pub use item::WorkItem;
pub use processor::{ProcessError, ProcessResult, Processor, ProcessorFn};
pub use state::{FileState, DONE_FILENAME};
pub use stats::TimerSnapshot;
