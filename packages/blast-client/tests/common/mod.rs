// Common test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use blast_client::{
    BlastClient, BlastRequest, ClientConfig, PollPolicy, Program, RawResponse, SubmissionParams,
    Transport, TransportError,
};
use tokio::time::Instant;

pub const RID: &str = "ABC123";

/// In-memory transport that replays a script of responses and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    sent: Mutex<Vec<(BlastRequest, Instant)>>,
    completed: Mutex<usize>,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every call takes `latency` of (virtual) time before answering.
    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            ..Default::default()
        })
    }

    pub fn respond(&self, status: u16, body: impl Into<String>) -> &Self {
        let body: String = body.into();
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(RawResponse::new(status, body)));
        self
    }

    pub fn fail(&self, err: TransportError) -> &Self {
        self.script.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn accept(&self, rid: &str) -> &Self {
        self.respond(200, submit_page(rid))
    }

    pub fn status(&self, token: &str) -> &Self {
        self.respond(200, status_page(token))
    }

    pub fn requests(&self) -> Vec<BlastRequest> {
        self.sent.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
    }

    pub fn request_times(&self) -> Vec<Instant> {
        self.sent.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    pub fn call_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn completed_count(&self) -> usize {
        *self.completed.lock().unwrap()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &BlastRequest,
        _timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((request.clone(), Instant::now()));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("script exhausted".into())));
        *self.completed.lock().unwrap() += 1;
        next
    }
}

pub fn submit_page(rid: &str) -> String {
    format!(
        r#"<html>
<body>
  <form name="results" action="Blast.cgi" method="post">
    <input type="hidden" name="RID" value="{rid}" id="rid">
  </form>
</body>
</html>"#
    )
}

pub fn submit_page_with_estimate(rid: &str, rtoe_secs: u64) -> String {
    format!(
        "{}\n<!--QBlastInfoBegin\n    RID = {}\n    RTOE = {}\nQBlastInfoEnd\n-->",
        submit_page(rid),
        rid,
        rtoe_secs
    )
}

pub fn status_page(token: &str) -> String {
    format!("<!--\nQBlastInfoBegin\n\tStatus={}\nQBlastInfoEnd\n-->\n", token)
}

pub fn client(transport: &Arc<ScriptedTransport>) -> BlastClient {
    BlastClient::with_transport(ClientConfig::default(), transport.clone())
}

pub fn params() -> SubmissionParams {
    SubmissionParams::new("ACGTACGTACGT", "nt", Program::Blastn)
}

/// 10 s before the first check and between checks.
pub fn ten_second_policy() -> PollPolicy {
    PollPolicy::default()
        .with_initial_delay(Duration::from_secs(10))
        .with_interval(Duration::from_secs(10))
        .with_min_interval(Duration::from_secs(10))
}

pub fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}
