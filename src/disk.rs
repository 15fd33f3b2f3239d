//! Filesystem-backed queue.
//!
//! `DiskBackend` implements claim, commit, failure, backpressure, and
//! shutdown semantics using nothing but a shared filesystem, tolerant of
//! any number of cooperating worker processes with no other
//! synchronization. The sole mutual-exclusion primitive is atomic rename;
//! see [`crate::state`] for the suffix protocol and its portability caveat.
//!
//! A chain of stages is built by pointing one backend's destination at the
//! next backend's source. The `done` marker propagates down the chain so
//! every stage eventually learns that no more work is coming.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::backend::QueueBackend;
use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::item::WorkItem;
use crate::state::{
    failed_name, gave_up_name, ready_name, working_name, writing_name, FileState, DONE_FILENAME,
};
use crate::stats::TimerSnapshot;

/// Queue backend coordinating through a shared filesystem.
#[derive(Debug)]
pub struct DiskBackend {
    source: Option<PathBuf>,
    destination: PathBuf,
    worker_tag: String,
    max_destination_files: usize,
    max_destination_bytes: u64,
    timer_file: Option<PathBuf>,
    quit_file: Option<PathBuf>,
}

impl DiskBackend {
    /// Create a new disk backend.
    ///
    /// The source directory, when configured, must already exist; the
    /// destination directory is created if missing.
    pub fn new(config: &QueueConfig) -> Result<Self> {
        if let Some(source) = &config.source {
            if !source.is_dir() {
                return Err(QueueError::Config(format!(
                    "source is not a directory: {}",
                    source.display()
                )));
            }
        }
        if !config.destination.exists() {
            fs::create_dir_all(&config.destination)?;
        } else if !config.destination.is_dir() {
            return Err(QueueError::Config(format!(
                "destination is not a directory: {}",
                config.destination.display()
            )));
        }

        tracing::info!(
            source = ?config.source.as_ref().map(|p| p.display().to_string()),
            destination = %config.destination.display(),
            worker_tag = %config.worker_tag,
            "creating disk queue backend"
        );

        Ok(Self {
            source: config.source.clone(),
            destination: config.destination.clone(),
            worker_tag: config.worker_tag.clone(),
            max_destination_files: config.max_destination_files,
            max_destination_bytes: config.max_destination_bytes,
            timer_file: config.timer_file.clone(),
            quit_file: config.quit_file.clone(),
        })
    }

    fn source_dir(&self) -> Result<&Path> {
        self.source
            .as_deref()
            .ok_or_else(|| QueueError::Config("this queue has no source directory".to_string()))
    }

    /// Scan the source directory for entries in `from` state and try to
    /// claim the first one by renaming it to `<id><tag>.working`.
    ///
    /// A failed rename means another worker got there first; that is the
    /// expected race, so it is logged at debug and the scan continues. If a
    /// claimed file's payload cannot be read, the claim is failed here so
    /// the dead file still travels the normal failure path, and the scan
    /// continues.
    fn claim_in_state(&self, from: FileState, retry: bool) -> Result<Option<WorkItem>> {
        let source = self.source_dir()?;
        for entry in fs::read_dir(source)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(id) = name.strip_suffix(from.suffix()) else {
                continue;
            };
            let working = source.join(working_name(id, &self.worker_tag));
            if let Err(e) = fs::rename(entry.path(), &working) {
                tracing::debug!(
                    path = %entry.path().display(),
                    error = %e,
                    "lost claim race, continuing scan"
                );
                continue;
            }
            match fs::read(&working) {
                Ok(payload) => {
                    tracing::debug!(item_id = %id, retry, "claimed item");
                    return Ok(Some(WorkItem {
                        id: id.to_string(),
                        payload,
                        retry,
                    }));
                }
                Err(e) => {
                    tracing::error!(item_id = %id, error = %e, "claimed file is unreadable");
                    let dead = WorkItem {
                        id: id.to_string(),
                        payload: Vec::new(),
                        retry,
                    };
                    if let Err(e) = self.fail_claim(&dead) {
                        tracing::error!(
                            item_id = %dead.id,
                            error = %e,
                            "failure handling for unreadable file failed"
                        );
                    }
                }
            }
        }
        Ok(None)
    }

    fn fail_claim(&self, item: &WorkItem) -> Result<()> {
        let source = self.source_dir()?;
        let working = source.join(working_name(&item.id, &self.worker_tag));
        if item.retry {
            fs::remove_file(&working)?;
            // Operator-visible tombstone; never claimed again.
            fs::File::create(source.join(gave_up_name(&item.id)))?;
            tracing::warn!(item_id = %item.id, "item failed twice, giving up");
        } else {
            fs::rename(&working, source.join(failed_name(&item.id)))?;
            tracing::warn!(item_id = %item.id, "item failed, eligible for one retry");
        }
        Ok(())
    }

    fn source_has_pending_or_in_flight(&self, source: &Path) -> Result<bool> {
        for entry in fs::read_dir(source)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if matches!(
                FileState::parse(name),
                Some((
                    _,
                    FileState::Ready | FileState::Working | FileState::Writing | FileState::Failed
                ))
            ) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn check_quit(&self) -> Result<bool> {
        // A done marker at the source means no more work will ever arrive;
        // once nothing is pending or in flight either, this stage is
        // finished and says so downstream before quitting. A backend with
        // no source relies on the quit file alone.
        if let Some(source) = &self.source {
            if source.join(DONE_FILENAME).exists()
                && !self.source_has_pending_or_in_flight(source)?
            {
                self.mark_destination_done()?;
                return Ok(true);
            }
        }

        if let Some(quit_file) = &self.quit_file {
            if quit_file.exists() {
                tracing::info!(quit_file = %quit_file.display(), "quit file present");
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Write the `done` marker into the destination directory. Idempotent.
    pub fn mark_destination_done(&self) -> Result<()> {
        fs::File::create(self.destination.join(DONE_FILENAME))?;
        Ok(())
    }

    /// Write the `done` marker into the source directory. Idempotent.
    ///
    /// Feeders call this once their input is exhausted.
    pub fn mark_source_done(&self) -> Result<()> {
        fs::File::create(self.source_dir()?.join(DONE_FILENAME))?;
        Ok(())
    }
}

#[async_trait]
impl QueueBackend for DiskBackend {
    async fn quit_requested(&self) -> bool {
        match self.check_quit() {
            Ok(quit) => quit,
            Err(e) => {
                tracing::warn!(error = %e, "quit check failed, keeping worker alive");
                false
            }
        }
    }

    async fn destination_is_full(&self) -> Result<bool> {
        // Anything not yet consumed downstream counts against the limits:
        // committed results, results still being written, and failures the
        // next stage has not retried yet. Checked before producing, with no
        // lock, so concurrent workers may collectively overshoot.
        let mut files = 0usize;
        let mut bytes = 0u64;
        for entry in fs::read_dir(&self.destination)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if matches!(
                FileState::parse(name),
                Some((_, FileState::Ready | FileState::Writing | FileState::Failed))
            ) {
                files += 1;
                if self.max_destination_bytes > 0 {
                    bytes += entry.metadata()?.len();
                }
            }
        }

        Ok((self.max_destination_files > 0 && files >= self.max_destination_files)
            || (self.max_destination_bytes > 0 && bytes >= self.max_destination_bytes))
    }

    async fn claim_next(&self) -> Result<Option<WorkItem>> {
        // Fresh work first; failed items are only retried when nothing new
        // is waiting.
        if let Some(item) = self.claim_in_state(FileState::Ready, false)? {
            return Ok(Some(item));
        }
        self.claim_in_state(FileState::Failed, true)
    }

    async fn commit(&self, item: &WorkItem, result: &[u8]) -> Result<()> {
        let writing = self.destination.join(writing_name(&item.id, &self.worker_tag));
        write_and_flush(&writing, result)?;

        // Reprocessing the same id is allowed; clear anything in the way,
        // then publish with an atomic rename.
        let ready = self.destination.join(ready_name(&item.id));
        if ready.exists() {
            fs::remove_file(&ready)?;
        }
        fs::rename(&writing, &ready)?;

        // Release the source-side claim only after the result is visible.
        // A crash before this point reprocesses the item; it never loses it.
        if let Some(source) = &self.source {
            remove_if_present(&source.join(working_name(&item.id, &self.worker_tag)))?;
        }

        tracing::debug!(item_id = %item.id, bytes = result.len(), "committed item");
        Ok(())
    }

    async fn fail(&self, item: &WorkItem) -> Result<()> {
        self.fail_claim(item)
    }

    async fn save_timers(&self, timers: &TimerSnapshot) -> Result<()> {
        let Some(timer_file) = &self.timer_file else {
            return Ok(());
        };
        let mut tmp = timer_file.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        write_and_flush(&tmp, timers.render().as_bytes())?;
        if timer_file.exists() {
            fs::remove_file(timer_file)?;
        }
        fs::rename(&tmp, timer_file)?;
        Ok(())
    }
}

/// Deposit a payload into a queue directory as `<id>.ready`.
///
/// Uses the same write-then-rename discipline as commit, so a claimer never
/// observes a partially written file. This is how feeders (and tests) put
/// work onto a queue.
pub fn enqueue(dir: &Path, id: &str, payload: &[u8], worker_tag: &str) -> Result<()> {
    let writing = dir.join(writing_name(id, worker_tag));
    write_and_flush(&writing, payload)?;
    let ready = dir.join(ready_name(id));
    if ready.exists() {
        fs::remove_file(&ready)?;
    }
    fs::rename(&writing, &ready)?;
    Ok(())
}

/// Write `bytes` to `path` and flush to disk before the caller publishes
/// the file with a rename.
fn write_and_flush(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
