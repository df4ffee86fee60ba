//! Poll policy and the per-job state machine.
//!
//! ```text
//! Submitting ──► Pending ──► Ready
//!     │             │  ▲
//!     │             │  └── WAITING / unknown token (sleep, check again)
//!     │             ├──► Failed
//!     └─────────────┴──► Aborted   (transport error, budget spent, cancelled)
//! ```
//!
//! One job is driven sequentially: submission, then one status check per
//! cycle, never two transport calls in flight. Cancellation is observed while
//! sleeping and while queued at the rate gate; a call already on the wire
//! always completes.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::BlastClient;
use crate::error::BlastError;
use crate::params::{FormatType, SubmissionParams};
use crate::rate_limit::NCBI_MIN_REQUEST_INTERVAL;
use crate::types::{JobStatus, RequestId};

/// Cadence and budget for status checks.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Wait between submission and the first status check
    pub initial_delay: Duration,
    /// Wait between consecutive status checks (before backoff)
    pub interval: Duration,
    /// Floor applied to every wait, whatever the other settings say
    pub min_interval: Duration,
    /// Multiplier applied to `interval` after each non-terminal check; 1.0 is a fixed cadence
    pub backoff: f64,
    /// Ceiling for backed-off waits
    pub max_interval: Duration,
    /// Give up after this many status checks
    pub max_attempts: Option<u32>,
    /// Give up once this much time has passed since submission
    pub max_wait: Option<Duration>,
    /// Stretch the first wait to the service's own completion estimate (`RTOE`)
    pub honor_estimate: bool,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: NCBI_MIN_REQUEST_INTERVAL,
            interval: Duration::from_secs(60),
            min_interval: NCBI_MIN_REQUEST_INTERVAL,
            backoff: 1.0,
            max_interval: Duration::from_secs(300),
            max_attempts: None,
            max_wait: None,
            honor_estimate: true,
        }
    }
}

impl PollPolicy {
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_backoff(mut self, factor: f64) -> Self {
        self.backoff = factor;
        self
    }

    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    pub fn with_honor_estimate(mut self, honor: bool) -> Self {
        self.honor_estimate = honor;
        self
    }

    pub fn validate(&self) -> Result<(), BlastError> {
        if self.max_attempts == Some(0) {
            return Err(BlastError::invalid("max_attempts", "must be at least 1"));
        }
        if !self.backoff.is_finite() || self.backoff < 1.0 {
            return Err(BlastError::invalid(
                "backoff",
                format!("must be a finite factor >= 1.0, got {}", self.backoff),
            ));
        }
        Ok(())
    }

    /// Wait before the first status check, given the service's estimate if any.
    pub fn first_delay(&self, estimate: Option<Duration>) -> Duration {
        let estimate = estimate
            .filter(|_| self.honor_estimate)
            .map(|e| e.min(self.max_interval))
            .unwrap_or(Duration::ZERO);
        self.initial_delay.max(estimate).max(self.min_interval)
    }

    /// Wait after the `checks`-th non-terminal status check.
    pub fn delay_after(&self, checks: u32) -> Duration {
        let exponent = checks.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.interval.as_secs_f64() * self.backoff.powi(exponent);
        let delay = if secs.is_finite() && secs < self.max_interval.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            self.max_interval.max(self.interval)
        };
        delay.max(self.min_interval)
    }
}

/// Lifecycle state of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Submitting,
    Pending,
    Ready,
    Failed,
    Aborted,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed | Self::Aborted)
    }
}

/// A job that reached `Ready` or `Failed`.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub request_id: RequestId,
    pub status: JobStatus,
    /// Number of status checks made
    pub attempts: u32,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub submitted_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
}

/// A job that ended in `Aborted`.
///
/// Carries the identifier whenever submission got that far, so the results
/// page can still be inspected by hand.
#[derive(Debug)]
pub struct JobError {
    pub request_id: Option<RequestId>,
    /// State the job was in when it was aborted (`Submitting` or `Pending`)
    pub state: JobState,
    pub last_status: Option<JobStatus>,
    pub attempts: u32,
    pub source: BlastError,
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.request_id {
            Some(rid) => write!(f, "BLAST job {} aborted: {}", rid, self.source),
            None => write!(f, "BLAST submission failed: {}", self.source),
        }
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Drives one job from submission to a terminal state.
pub(crate) struct PollLoop<'a> {
    client: &'a BlastClient,
    policy: &'a PollPolicy,
    cancel: &'a CancellationToken,
    state: JobState,
    request_id: Option<RequestId>,
    last_status: Option<JobStatus>,
    attempts: u32,
    submitted_at: Option<DateTime<Utc>>,
}

impl<'a> PollLoop<'a> {
    pub(crate) fn new(
        client: &'a BlastClient,
        policy: &'a PollPolicy,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            client,
            policy,
            cancel,
            state: JobState::Submitting,
            request_id: None,
            last_status: None,
            attempts: 0,
            submitted_at: None,
        }
    }

    /// Submit `params`, then poll until a terminal state.
    pub(crate) async fn submit_and_poll(
        mut self,
        params: SubmissionParams,
    ) -> Result<JobOutcome, JobError> {
        if let Err(e) = self.policy.validate() {
            return Err(self.abort(e));
        }
        if self.cancel.is_cancelled() {
            return Err(self.abort(BlastError::Cancelled));
        }

        // Never retried: a rejected query must not be silently re-sent
        let submission = match self.client.submit_with_cancel(&params, self.cancel).await {
            Ok(submission) => submission,
            Err(e) => return Err(self.abort(e)),
        };
        self.submitted_at = Some(Utc::now());

        let first_delay = self.policy.first_delay(submission.estimated_wait);
        self.poll(submission.request_id, params.format, first_delay)
            .await
    }

    /// Poll an identifier that was already submitted.
    pub(crate) async fn resume(
        mut self,
        request_id: RequestId,
        format: FormatType,
    ) -> Result<JobOutcome, JobError> {
        self.request_id = Some(request_id.clone());
        self.state = JobState::Pending;
        if let Err(e) = self.policy.validate() {
            return Err(self.abort(e));
        }
        let first_delay = self.policy.first_delay(None);
        self.poll(request_id, format, first_delay).await
    }

    async fn poll(
        mut self,
        request_id: RequestId,
        format: FormatType,
        first_delay: Duration,
    ) -> Result<JobOutcome, JobError> {
        self.request_id = Some(request_id.clone());
        self.transition(JobState::Pending);
        info!(rid = %request_id, first_check_in = ?first_delay, "BLAST job pending");

        let started = Instant::now();
        let mut delay = first_delay;

        loop {
            if let Some(max_wait) = self.policy.max_wait {
                let waited = started.elapsed();
                if waited.saturating_add(delay) > max_wait {
                    return Err(self.abort(BlastError::WaitExceeded { waited }));
                }
            }

            if let Err(e) = self.pause(delay).await {
                return Err(self.abort(e));
            }

            let checked = self
                .client
                .check_status_with_cancel(&request_id, format, self.cancel)
                .await;
            // A check stopped at the rate gate never reached the service
            if !matches!(checked, Err(BlastError::Cancelled)) {
                self.attempts += 1;
            }
            let status = match checked {
                Ok(status) => status,
                Err(e) => return Err(self.abort(e)),
            };
            self.last_status = Some(status);
            debug!(rid = %request_id, attempt = self.attempts, status = %status, "status check");

            match status {
                JobStatus::Ready => {
                    return Ok(self.finish(JobState::Ready, status, request_id, started))
                }
                JobStatus::Failed => {
                    return Ok(self.finish(JobState::Failed, status, request_id, started))
                }
                JobStatus::Pending | JobStatus::Unknown => {}
            }

            if let Some(max_attempts) = self.policy.max_attempts {
                if self.attempts >= max_attempts {
                    let attempts = self.attempts;
                    return Err(self.abort(BlastError::AttemptsExhausted { attempts }));
                }
            }

            delay = self.policy.delay_after(self.attempts);
        }
    }

    /// Sleep for `delay` unless cancelled first.
    async fn pause(&self, delay: Duration) -> Result<(), BlastError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(BlastError::Cancelled),
            _ = sleep(delay) => Ok(()),
        }
    }

    fn transition(&mut self, next: JobState) {
        debug_assert!(!self.state.is_terminal(), "job already terminal");
        debug!(from = ?self.state, to = ?next, "job state transition");
        self.state = next;
    }

    fn finish(
        mut self,
        state: JobState,
        status: JobStatus,
        request_id: RequestId,
        started: Instant,
    ) -> JobOutcome {
        self.transition(state);
        info!(rid = %request_id, status = %status, attempts = self.attempts, "BLAST job finished");

        JobOutcome {
            request_id,
            status,
            attempts: self.attempts,
            elapsed: started.elapsed(),
            submitted_at: self.submitted_at,
            finished_at: Utc::now(),
        }
    }

    fn abort(mut self, source: BlastError) -> JobError {
        let state = self.state;
        self.transition(JobState::Aborted);
        match &self.request_id {
            Some(rid) => warn!(rid = %rid, error = %source, "BLAST job aborted"),
            None => warn!(error = %source, "BLAST submission aborted"),
        }

        JobError {
            request_id: self.request_id,
            state,
            last_status: self.last_status,
            attempts: self.attempts,
            source,
        }
    }
}
