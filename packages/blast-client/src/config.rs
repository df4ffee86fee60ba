use std::env;
use std::time::Duration;

use dotenvy::dotenv;
use url::Url;

use crate::error::{BlastError, Result};

/// Public NCBI endpoint.
pub const DEFAULT_BASE_URL: &str = "https://blast.ncbi.nlm.nih.gov/Blast.cgi";

/// Bound on every single request/response exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client configuration, passed to the transport at construction time.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
    /// Sent as `TOOL` on submissions so NCBI can identify the client
    pub tool: Option<String>,
    /// Sent as `EMAIL` on submissions so NCBI can reach the operator
    pub email: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            tool: None,
            email: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// Reads `BLAST_BASE_URL`, `BLAST_REQUEST_TIMEOUT_SECS`, `BLAST_TOOL` and `BLAST_EMAIL`.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let mut config = Self::default();

        if let Ok(base_url) = env::var("BLAST_BASE_URL") {
            config.base_url = Url::parse(&base_url)
                .map_err(|e| BlastError::Config(format!("BLAST_BASE_URL '{}': {}", base_url, e)))?;
        }
        if let Ok(secs) = env::var("BLAST_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                BlastError::Config(format!(
                    "BLAST_REQUEST_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    secs
                ))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }
        config.tool = env::var("BLAST_TOOL").ok().filter(|v| !v.is_empty());
        config.email = env::var("BLAST_EMAIL").ok().filter(|v| !v.is_empty());

        Ok(config)
    }

    pub fn with_base_url(mut self, url: Url) -> Self {
        self.base_url = url;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}
