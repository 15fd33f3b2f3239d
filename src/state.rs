//! Claim states and the filename suffix protocol.
//!
//! The status of every file in a queue directory is encoded entirely in its
//! name. Status changes *must* go through rename, which we assume is atomic;
//! that assumption is what lets multiple worker processes share a directory
//! with no locks. Atomic rename holds on POSIX filesystems when source and
//! target are on the same filesystem; it is not guaranteed on all Windows
//! filesystems, so deployments there need care.
//!
//! The suffixes are a wire protocol shared with every other process pointed
//! at the same directories and must not change:
//!
//! | name | meaning |
//! |---|---|
//! | `<id>.ready` | claimable, or fully committed and visible |
//! | `<id><tag>.working` | exclusively claimed by the worker owning `tag` |
//! | `<id><tag>.writing.xml` | result being written by that worker, not yet visible |
//! | `<id>.failed` | failed once; eligible for exactly one retry |
//! | `<id>.failed_twice` | failed on retry; permanently abandoned |
//! | `done` | marker: no more work will ever arrive at this directory |

/// Marker file name signalling that a stage will produce no further work.
pub const DONE_FILENAME: &str = "done";

/// The lifecycle state a queue file name encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileState {
    /// Available to be claimed, or (at a destination) fully committed.
    Ready,
    /// Exclusively claimed by one worker.
    Working,
    /// Result being written, not yet visible downstream.
    Writing,
    /// Failed once; one retry remains.
    Failed,
    /// Failed on the retry; abandoned for good.
    GivenUp,
}

impl FileState {
    /// The file name suffix encoding this state.
    pub fn suffix(&self) -> &'static str {
        match self {
            FileState::Ready => ".ready",
            FileState::Working => ".working",
            FileState::Writing => ".writing.xml",
            FileState::Failed => ".failed",
            FileState::GivenUp => ".failed_twice",
        }
    }

    /// Parse a queue file name into its stem and state.
    ///
    /// For [`FileState::Working`] and [`FileState::Writing`] the stem still
    /// carries the claiming worker's tag, since the tag is an opaque string
    /// that cannot be split off without knowing it. Returns `None` for names
    /// that carry no status suffix (including the `done` marker).
    pub fn parse(file_name: &str) -> Option<(&str, FileState)> {
        // ".failed_twice" does not end with ".failed", so order does not
        // matter for correctness; keep it explicit anyway.
        for state in [
            FileState::Writing,
            FileState::Working,
            FileState::GivenUp,
            FileState::Failed,
            FileState::Ready,
        ] {
            if let Some(stem) = file_name.strip_suffix(state.suffix()) {
                return Some((stem, state));
            }
        }
        None
    }
}

/// File name marking `id` as claimable.
pub fn ready_name(id: &str) -> String {
    format!("{id}{}", FileState::Ready.suffix())
}

/// File name marking `id` as exclusively claimed by `worker_tag`.
pub fn working_name(id: &str, worker_tag: &str) -> String {
    format!("{id}{worker_tag}{}", FileState::Working.suffix())
}

/// File name for a result of `id` still being written by `worker_tag`.
pub fn writing_name(id: &str, worker_tag: &str) -> String {
    format!("{id}{worker_tag}{}", FileState::Writing.suffix())
}

/// File name marking `id` as failed once.
pub fn failed_name(id: &str) -> String {
    format!("{id}{}", FileState::Failed.suffix())
}

/// File name marking `id` as permanently abandoned.
pub fn gave_up_name(id: &str) -> String {
    format!("{id}{}", FileState::GivenUp.suffix())
}
