//! Rate-limited failure logging
//!
//! A broker outage makes every worker fail every message at once. Each
//! dropped message is still reported by hash at `warn`, but the `error`
//! line with a payload preview is emitted at most once per interval, along
//! with how many failures happened in between.
//!
//! # Example
//!
//! ```ignore
//! let logger = RateLimitedLogger::new(Duration::from_secs(10));
//!
//! // One warn per message; the error line with a preview at most every 10s
//! for payload in failed {
//!     logger.publish_failed(worker_id, &error, &payload);
//! }
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default interval between failure log lines
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Maximum payload bytes included in a log line
pub const MAX_PREVIEW_LENGTH: usize = 256;

/// Logger that emits at most once per interval
///
/// Thread-safe: atomic counters plus a mutex around the last log time.
#[derive(Debug)]
pub struct RateLimitedLogger {
    min_interval: Duration,
    last_log_time: Mutex<Option<Instant>>,

    /// Failures since the last emitted line
    pending: AtomicU64,

    total: AtomicU64,
}

impl RateLimitedLogger {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_log_time: Mutex::new(None),
            pending: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// Record a failure; returns the number of failures this call reports,
    /// or `None` if it must stay quiet
    fn admit(&self) -> Option<u64> {
        self.pending.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);

        {
            let mut last_time = self.last_log_time.lock();
            let now = Instant::now();
            match *last_time {
                Some(last) if now.duration_since(last) < self.min_interval => return None,
                _ => *last_time = Some(now),
            }
        }

        Some(self.pending.swap(0, Ordering::Relaxed))
    }

    /// Report a message the broker client refused
    ///
    /// Every dropped message gets its own `warn` line with its length and
    /// content hash. On top of that, at most one `error` line per interval
    /// carries a payload preview and the number of failures since the last
    /// one. Returns true if that `error` line was emitted.
    pub fn publish_failed(
        &self,
        worker_id: usize,
        error: &dyn std::fmt::Display,
        payload: &[u8],
    ) -> bool {
        let hash = payload_hash(payload);

        tracing::warn!(
            worker_id,
            error = %error,
            payload_len = payload.len(),
            payload_hash = hash,
            "message dropped"
        );

        let Some(count) = self.admit() else {
            return false;
        };

        tracing::error!(
            worker_id,
            error = %error,
            payload_len = payload.len(),
            payload_hash = hash,
            payload_preview = %payload_preview(payload),
            suppressed_count = count.saturating_sub(1),
            total_failures = self.total.load(Ordering::Relaxed),
            "publish failed, message dropped"
        );
        true
    }
}

impl Default for RateLimitedLogger {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_INTERVAL)
    }
}

/// Lossy UTF-8 preview of at most `MAX_PREVIEW_LENGTH` bytes
pub fn payload_preview(payload: &[u8]) -> String {
    if payload.len() > MAX_PREVIEW_LENGTH {
        format!(
            "{}... (truncated from {} bytes)",
            String::from_utf8_lossy(&payload[..MAX_PREVIEW_LENGTH]),
            payload.len()
        )
    } else {
        String::from_utf8_lossy(payload).into_owned()
    }
}

/// Content hash for correlating dropped payloads across log lines
pub fn payload_hash(payload: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    payload.hash(&mut hasher);
    hasher.finish()
}
