//! Pure NCBI BLAST URL API client.
//!
//! A minimal client for the asynchronous BLAST web service. Supports submitting
//! searches, polling for completion within the service's rate limits, and
//! fetching the raw report.
//!
//! # Example
//!
//! ```rust,ignore
//! use blast_client::{BlastClient, PollPolicy, Program, SubmissionParams};
//!
//! let client = BlastClient::from_env()?;
//!
//! let params = SubmissionParams::new("u00001", "nt", Program::Blastn).with_expect(1e-10);
//! match client.submit_and_poll(params, &PollPolicy::default()).await {
//!     Ok(outcome) => println!("{}: {}", outcome.status, client.results_reference(&outcome.request_id)),
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod params;
pub mod poll;
pub mod rate_limit;
pub mod request;
pub mod transport;
pub mod types;

pub use client::{BlastClient, Submission};
pub use config::ClientConfig;
pub use error::{BlastError, Result, TransportError};
pub use params::{
    CompositionStats, Filter, FilterMode, FormatObject, FormatType, GapCosts, Program,
    ScoringMatrix, SearchOptions, SubmissionParams,
};
pub use poll::{JobError, JobOutcome, JobState, PollPolicy};
pub use rate_limit::RateGate;
pub use request::{results_reference_for, BlastRequest, Method};
pub use transport::{HttpTransport, RawResponse, Transport};
pub use types::{JobStatus, RequestId};

pub use tokio_util::sync::CancellationToken;
