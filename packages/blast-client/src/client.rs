use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{BlastError, Result};
use crate::extract::{extract_estimated_wait, extract_request_id, extract_status};
use crate::params::{FormatType, SearchOptions, SubmissionParams};
use crate::poll::{JobError, JobOutcome, PollLoop, PollPolicy};
use crate::rate_limit::RateGate;
use crate::request::{
    build_delete_request, build_results_request, build_status_request,
    build_submission_request, results_reference_for, BlastRequest,
};
use crate::transport::{HttpTransport, RawResponse, Transport};
use crate::types::{JobStatus, RequestId};

/// What the service handed back for an accepted submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub request_id: RequestId,
    /// The service's own completion estimate (`RTOE`), when advertised
    pub estimated_wait: Option<std::time::Duration>,
}

/// NCBI BLAST URL API client.
///
/// Cheap to clone. Clones share the transport and the rate gate, so several
/// jobs driven from clones of one client stay inside one request budget.
#[derive(Clone)]
pub struct BlastClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    gate: Option<RateGate>,
}

impl BlastClient {
    /// HTTP client against `config.base_url`, spaced by the NCBI rate gate.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self {
            transport: Arc::new(transport),
            config,
            gate: Some(RateGate::ncbi()),
        })
    }

    /// Create from `BLAST_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Client over a caller-supplied transport. No rate gate until one is attached.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config,
            gate: None,
        }
    }

    /// Share `gate` with every other client holding a clone of it.
    pub fn with_rate_gate(mut self, gate: RateGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn without_rate_gate(mut self) -> Self {
        self.gate = None;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Submit a search. Parameters are validated before anything is sent.
    pub async fn submit(&self, params: &SubmissionParams) -> Result<Submission> {
        self.submit_inner(params, None).await
    }

    /// Like `submit`, giving up at the rate gate once `cancel` fires.
    pub(crate) async fn submit_with_cancel(
        &self,
        params: &SubmissionParams,
        cancel: &CancellationToken,
    ) -> Result<Submission> {
        self.submit_inner(params, Some(cancel)).await
    }

    async fn submit_inner(
        &self,
        params: &SubmissionParams,
        cancel: Option<&CancellationToken>,
    ) -> Result<Submission> {
        let request = build_submission_request(&self.config, params)?;
        info!(
            program = %params.program,
            database = %params.database,
            query_len = params.query.len(),
            "submitting BLAST search"
        );

        let resp = self.exchange(&request, cancel).await?;
        let request_id = extract_request_id(&resp.body)?;
        let estimated_wait = extract_estimated_wait(&resp.body);
        info!(rid = %request_id, estimated_wait = ?estimated_wait, "BLAST search accepted");

        Ok(Submission {
            request_id,
            estimated_wait,
        })
    }

    /// One status check.
    pub async fn check_status(&self, rid: &RequestId, format: FormatType) -> Result<JobStatus> {
        let request = build_status_request(&self.config, rid, format);
        let resp = self.exchange(&request, None).await?;
        Ok(extract_status(&resp.body))
    }

    pub(crate) async fn check_status_with_cancel(
        &self,
        rid: &RequestId,
        format: FormatType,
        cancel: &CancellationToken,
    ) -> Result<JobStatus> {
        let request = build_status_request(&self.config, rid, format);
        let resp = self.exchange(&request, Some(cancel)).await?;
        Ok(extract_status(&resp.body))
    }

    /// Raw report bytes for a finished search. The payload is not interpreted.
    pub async fn fetch_results(
        &self,
        rid: &RequestId,
        format: FormatType,
        options: &SearchOptions,
    ) -> Result<Bytes> {
        let request = build_results_request(&self.config, rid, format, options);
        let resp = self.exchange(&request, None).await?;
        debug!(rid = %rid, bytes = resp.body.len(), "fetched BLAST report");
        Ok(resp.body)
    }

    /// Ask the service to drop a search.
    pub async fn delete(&self, rid: &RequestId) -> Result<()> {
        let request = build_delete_request(&self.config, rid);
        self.exchange(&request, None).await?;
        info!(rid = %rid, "BLAST search deleted");
        Ok(())
    }

    /// Results page for `rid` on this client's endpoint. Performs no I/O.
    pub fn results_reference(&self, rid: &RequestId) -> Url {
        results_reference_for(&self.config.base_url, rid)
    }

    /// Submit and poll until `Ready`, `Failed` or abort.
    pub async fn submit_and_poll(
        &self,
        params: SubmissionParams,
        policy: &PollPolicy,
    ) -> std::result::Result<JobOutcome, JobError> {
        let cancel = CancellationToken::new();
        self.submit_and_poll_with_cancel(params, policy, &cancel)
            .await
    }

    /// Like `submit_and_poll`, stopping at the next sleep once `cancel` fires.
    pub async fn submit_and_poll_with_cancel(
        &self,
        params: SubmissionParams,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> std::result::Result<JobOutcome, JobError> {
        PollLoop::new(self, policy, cancel)
            .submit_and_poll(params)
            .await
    }

    /// Poll a search submitted earlier (by this or another process).
    pub async fn poll(
        &self,
        rid: RequestId,
        format: FormatType,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> std::result::Result<JobOutcome, JobError> {
        PollLoop::new(self, policy, cancel).resume(rid, format).await
    }

    /// Gate, send, and reject non-2xx answers.
    ///
    /// With a `cancel` token the gate wait is abandoned once it fires, and
    /// nothing is sent.
    async fn exchange(
        &self,
        request: &BlastRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<RawResponse> {
        match (&self.gate, cancel) {
            (Some(gate), Some(cancel)) => gate.acquire_or_cancel(cancel).await?,
            (Some(gate), None) => gate.acquire().await,
            (None, _) => {}
        }
        if cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(BlastError::Cancelled);
        }
        let resp = self
            .transport
            .send(request, self.config.request_timeout)
            .await?
            .error_for_status()?;
        Ok(resp)
    }
}
