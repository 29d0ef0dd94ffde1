//! Fixed-interval pacing for one class of external calls.

use tokio::time::{sleep, Duration};

use crate::types::{PATCH_INTERVAL, POST_INTERVAL};

/// Enforces a minimum delay between successive calls of one class.
///
/// The first call of a sequence (`index == 0`) is never delayed; every later
/// call waits the full interval. There is no burst allowance, no adaptive
/// backoff and no jitter. A gate paces only the call sequence it is handed
/// to; two concurrent sequences with separate gates can jointly exceed the
/// provider quota.
#[derive(Debug, Clone)]
pub struct RateGate {
    interval: Duration,
}

impl RateGate {
    /// Gate with an arbitrary interval, for injected or externally
    /// coordinated pacing.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Gate for PATCH-class calls.
    pub fn patch() -> Self {
        Self::new(PATCH_INTERVAL)
    }

    /// Gate for POST-class calls.
    pub fn post() -> Self {
        Self::new(POST_INTERVAL)
    }

    /// Configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Suspends the caller for the full interval unless this is the first
    /// call of the sequence.
    pub async fn wait_before_call(&self, index: usize) {
        if index == 0 {
            return;
        }
        sleep(self.interval).await;
    }

    /// Advisory total gate delay for a sequence of `calls` calls. Used for
    /// log lines only, never enforced.
    pub fn estimate(&self, calls: usize) -> Duration {
        match calls {
            0 | 1 => Duration::ZERO,
            n => self.interval * (n as u32 - 1),
        }
    }
}
