//! Basic example: one worker draining a directory queue.
//!
//! This example demonstrates:
//! - Feeding work into a source directory
//! - Running the engine with a trivial processor
//! - Shutting down through the `done` marker
//!
//! Run with: `cargo run --example basic`

use dirq::{enqueue, DiskBackend, ProcessorFn, QueueConfig, QueueEngine, WorkItem};

#[tokio::main]
async fn main() -> dirq::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let root = tempfile::tempdir().expect("create temp dirs");
    let source = root.path().join("raw");
    let destination = root.path().join("upper");
    std::fs::create_dir(&source)?;

    // Feed three documents onto the queue, then announce that no more work
    // is coming.
    for (id, text) in [
        ("doc1", "the quick brown fox"),
        ("doc2", "jumps over"),
        ("doc3", "the lazy dog"),
    ] {
        enqueue(&source, id, text.as_bytes(), "-feeder")?;
    }

    let config = QueueConfig::builder(&destination)
        .source(&source)
        .worker_tag("-w1")
        .build();
    let backend = DiskBackend::new(&config)?;
    backend.mark_source_done()?;

    let processor = ProcessorFn(|item: WorkItem| async move {
        Ok(item.payload.to_ascii_uppercase())
    });

    let mut engine = QueueEngine::new(backend, processor);
    engine.run().await;

    println!("timers:\n{}", engine.timers().render());
    for entry in std::fs::read_dir(&destination)? {
        let entry = entry?;
        println!(
            "{}: {}",
            entry.file_name().to_string_lossy(),
            String::from_utf8_lossy(&std::fs::read(entry.path())?)
        );
    }
    Ok(())
}
