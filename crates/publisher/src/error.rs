//! Publisher and pool error types

use thiserror::Error;

/// Errors from a broker publisher handle
#[derive(Debug, Error)]
pub enum PublishError {
    /// The handle could not be created or failed its startup check
    #[error("publisher initialization failed: {0}")]
    Init(String),

    /// The broker client refused the message
    #[error("message rejected: {0}")]
    Rejected(String),

    /// The handle has been closed
    #[error("publisher closed")]
    Closed,
}

/// Errors from the producer worker pool
#[derive(Debug, Error)]
pub enum PoolError {
    /// A worker's publisher handle failed to initialize; no worker was started
    #[error("worker {worker_id} failed to initialize: {source}")]
    Init {
        worker_id: usize,
        #[source]
        source: PublishError,
    },

    /// The pool was asked to start zero workers
    #[error("producer pool requires at least one worker")]
    NoWorkers,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PoolError::Init {
            worker_id: 3,
            source: PublishError::Init("broker unreachable".into()),
        };
        let text = err.to_string();
        assert!(text.contains("worker 3"));
        assert!(text.contains("broker unreachable"));

        assert!(PublishError::Closed.to_string().contains("closed"));
        assert!(PoolError::NoWorkers.to_string().contains("at least one"));
    }
}
