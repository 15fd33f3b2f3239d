//! Error types for the dirq work queue library.

use thiserror::Error;

/// The main error type for the dirq library.
///
/// Note that "lost a claim race to another worker" is *not* an error: it is
/// an expected outcome of running multiple workers against one directory, and
/// backends handle it silently. Processor failures are likewise kept out of
/// this type; they travel as [`crate::ProcessError`] values and are consumed
/// inside the engine loop.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Filesystem error from a queue backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend-specific error.
    #[error("Backend error: {0}")]
    Backend(String),

    /// No backend factory registered under the requested name.
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),
}

/// Result type alias using QueueError.
pub type Result<T> = std::result::Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = QueueError::Io(io_err);
        let display = format!("{}", err);
        assert!(display.starts_with("I/O error:"));
    }

    #[test]
    fn test_error_display_config() {
        let err = QueueError::Config("no destination directory".to_string());
        assert_eq!(
            format!("{}", err),
            "Configuration error: no destination directory"
        );
    }

    #[test]
    fn test_error_display_backend() {
        let err = QueueError::Backend("stat failed".to_string());
        assert_eq!(format!("{}", err), "Backend error: stat failed");
    }

    #[test]
    fn test_error_display_unknown_backend() {
        let err = QueueError::UnknownBackend("amqp".to_string());
        assert_eq!(format!("{}", err), "Unknown backend: amqp");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: QueueError = io_err.into();
        assert!(matches!(err, QueueError::Io(_)));
    }
}
