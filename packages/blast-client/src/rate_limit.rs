//! Process-wide request spacing.
//!
//! NCBI limits the whole client, not each job, to one request every ten
//! seconds. A `RateGate` is cloned into every `BlastClient` that shares that
//! budget; each transport call first waits its turn at the gate.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::BlastError;

/// Minimum spacing the public service asks for between any two requests.
pub const NCBI_MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct RateGate {
    interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RateGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Gate tuned to the public NCBI endpoint.
    pub fn ncbi() -> Self {
        Self::new(NCBI_MIN_REQUEST_INTERVAL)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until at least `interval` has passed since the previous caller got through.
    ///
    /// The lock is held across the wait so callers are released one at a time.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let wait = self.interval.saturating_sub(prev.elapsed());
            if !wait.is_zero() {
                debug!(wait = ?wait, "rate gate holding request");
                sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// `acquire`, abandoned with `Cancelled` if `cancel` fires first.
    ///
    /// An abandoned wait does not consume a slot.
    pub async fn acquire_or_cancel(&self, cancel: &CancellationToken) -> Result<(), BlastError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BlastError::Cancelled),
            _ = self.acquire() => Ok(()),
        }
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::ncbi()
    }
}
