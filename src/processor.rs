//! The processing step contract.
//!
//! The engine knows nothing about what processing means; document parsing,
//! format conversion, whatever. It hands a claimed item to a [`Processor`]
//! and turns the outcome into a commit or a failure. Errors are opaque to
//! the engine, and even a panic inside `process` is contained at the loop
//! level; a single bad item never stops the loop.

use async_trait::async_trait;
use std::future::Future;

use crate::item::WorkItem;

/// Error returned from a processor.
///
/// Deliberately just a message: the engine does not interpret processing
/// failures beyond logging them and routing the item into the retry path.
#[derive(Debug)]
pub struct ProcessError {
    /// Human-readable description, logged with the item id.
    pub message: String,
}

impl ProcessError {
    /// Create a new process error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl<E: std::error::Error> From<E> for ProcessError {
    fn from(err: E) -> Self {
        Self::new(err.to_string())
    }
}

/// Result type for processors: the serialized result payload on success.
pub type ProcessResult = std::result::Result<Vec<u8>, ProcessError>;

/// An externally supplied processing step.
///
/// There is no timeout around `process` and no way to abort it; quit
/// signals are only checked between items. That is a deliberate design
/// limitation carried over from the original system.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Consume an item's payload and produce the result payload.
    async fn process(&self, item: &WorkItem) -> ProcessResult;
}

/// Adapter letting a plain async function serve as a [`Processor`].
pub struct ProcessorFn<F>(pub F);

#[async_trait]
impl<F, Fut> Processor for ProcessorFn<F>
where
    F: Fn(WorkItem) -> Fut + Send + Sync,
    Fut: Future<Output = ProcessResult> + Send,
{
    async fn process(&self, item: &WorkItem) -> ProcessResult {
        (self.0)(item.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_error_display() {
        let err = ProcessError::new("tokenizer choked");
        assert_eq!(format!("{}", err), "tokenizer choked");
    }

    #[test]
    fn test_process_error_from_std_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ProcessError = io_err.into();
        assert!(err.message.contains("gone"));
    }

    #[tokio::test]
    async fn test_processor_fn_adapter() {
        let processor = ProcessorFn(|item: WorkItem| async move {
            Ok(item.payload.iter().rev().copied().collect())
        });
        let item = WorkItem::new("doc1", b"abc".to_vec());
        let result = processor.process(&item).await.unwrap();
        assert_eq!(result, b"cba");
    }
}
