//! The unit of work.

/// A claimed unit of work.
///
/// A `WorkItem` is created when a backend successfully claims a pending
/// entry, is owned exclusively by the claiming worker until it is committed
/// or failed, and is dropped afterwards. Two workers never hold the same
/// item at the same time; that mutual exclusion is the one guarantee the
/// whole system is built on.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Identifier derived from the source file name with all status
    /// suffixes stripped.
    pub id: String,
    /// Raw bytes of the claimed input. Opaque to the engine; only the
    /// processor interprets it.
    pub payload: Vec<u8>,
    /// True when this claim originated from a `.failed` entry. A second
    /// failure of a retried item is terminal.
    pub retry: bool,
}

impl WorkItem {
    /// Create a fresh (non-retry) work item.
    pub fn new(id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            payload,
            retry: false,
        }
    }
}
