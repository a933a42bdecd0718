//! Bounded polling.
//!
//! The only form of waiting the probe does: ask, sleep, ask again, until the
//! condition holds or the timeout passes. No backoff.

use std::thread;
use std::time::{Duration, Instant};

/// How long and how often to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn from_millis(timeout_ms: u64, interval_ms: u64) -> Self {
        PollPolicy {
            timeout: Duration::from_millis(timeout_ms),
            interval: Duration::from_millis(interval_ms.max(1)),
        }
    }
}

/// Result of a completed poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The probe produced a value after `attempts` calls
    Ready { value: T, attempts: u32 },
    /// The timeout elapsed without a value; `elapsed` is never below the timeout
    TimedOut { elapsed: Duration, attempts: u32 },
}

/// Call `probe` until it returns `Some`, an error, or `policy.timeout` elapses.
///
/// The probe is always called at least once. Errors stop polling and are
/// returned unchanged.
pub fn poll_until<T, E, F>(policy: &PollPolicy, mut probe: F) -> Result<PollOutcome<T>, E>
where
    F: FnMut() -> Result<Option<T>, E>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if let Some(value) = probe()? {
            return Ok(PollOutcome::Ready { value, attempts });
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            tracing::debug!(attempts, elapsed_ms = elapsed.as_millis() as u64, "poll timed out");
            return Ok(PollOutcome::TimedOut { elapsed, attempts });
        }

        thread::sleep(policy.interval.min(policy.timeout - elapsed));
    }
}
