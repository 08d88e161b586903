//! Relay queue error types

use thiserror::Error;

/// Relay queue errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// Every receiver is gone; the message could not be queued
    #[error("relay queue closed")]
    Closed,
}

/// Result type for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert!(QueueError::Closed.to_string().contains("closed"));
    }
}
