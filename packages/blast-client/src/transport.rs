use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{BlastError, TransportError};
use crate::request::{BlastRequest, Method};

/// Status code and raw body of one exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx answer into `TransportError::Status`.
    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::Status {
                status: self.status,
                body: String::from_utf8_lossy(&self.body).into_owned(),
            })
        }
    }
}

/// A single timeout-bounded request/response call.
///
/// Implementations must not retry and must not pool state across jobs
/// beyond what the underlying HTTP client does on its own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &BlastRequest,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build the underlying client from `config`.
    pub fn new(config: &ClientConfig) -> Result<Self, BlastError> {
        let user_agent = match &config.tool {
            Some(tool) => format!("{} blast-client/{}", tool, env!("CARGO_PKG_VERSION")),
            None => format!("blast-client/{}", env!("CARGO_PKG_VERSION")),
        };
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| BlastError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Use an existing reqwest client (custom proxies, TLS roots).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &BlastRequest,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        let url = request.url();
        debug!(method = ?request.method, url = %url, "sending BLAST request");

        let builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self
                .client
                .post(url)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(request.encoded_params()),
        };

        let resp = builder
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout))?;

        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout))?;

        Ok(RawResponse { status, body })
    }
}
