//! Command-line wrapper around `blast-client`.
//!
//! Submits one search, waits for it within the NCBI rate limits, and prints
//! where the results can be found. Ctrl-C stops at the next wait.

use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use blast_client::{
    BlastClient, CancellationToken, CompositionStats, Filter, FormatType, GapCosts, JobError,
    JobOutcome, JobStatus, PollPolicy, Program, ScoringMatrix, SubmissionParams,
};
use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "blast")]
#[command(about = "Submit a search to NCBI BLAST and wait for it to finish")]
struct Cli {
    /// Query sequence: accession, GI, or FASTA text
    #[arg(long)]
    query: String,

    /// Database to search
    #[arg(long, default_value = "nt")]
    database: String,

    /// blastn, megablast, blastp, blastx, tblastn or tblastx
    #[arg(long, default_value = "blastn")]
    program: Program,

    /// HTML, Text, XML, XML2, JSON2 or Tabular
    #[arg(long, default_value = "Text")]
    format: FormatType,

    /// Expect value (> 0)
    #[arg(long)]
    expect: Option<f64>,

    /// Reward for matching bases (> 0, blastn/megablast)
    #[arg(long)]
    reward: Option<i32>,

    /// Cost for mismatched bases (< 0, blastn/megablast)
    #[arg(long, allow_negative_numbers = true)]
    penalty: Option<i32>,

    /// Gap existence and extension costs, e.g. "11 1"
    #[arg(long)]
    gap_costs: Option<GapCosts>,

    /// Scoring matrix, e.g. BLOSUM62
    #[arg(long)]
    matrix: Option<ScoringMatrix>,

    /// Number of database sequences to keep
    #[arg(long)]
    hitlist_size: Option<u32>,

    /// Number of descriptions to print
    #[arg(long)]
    descriptions: Option<u32>,

    /// Number of alignments to print
    #[arg(long)]
    alignments: Option<u32>,

    /// Show NCBI GIs in the report
    #[arg(long)]
    ncbi_gi: Option<bool>,

    /// Neighboring score for initial words (not blastn/megablast)
    #[arg(long)]
    threshold: Option<u32>,

    /// Size of word for initial matches
    #[arg(long)]
    word_size: Option<u32>,

    /// Composition-based statistics: 0, 1, 2 or 3
    #[arg(long)]
    comp_stats: Option<u8>,

    /// Low-complexity filter: F, T, L, mT or mL
    #[arg(long)]
    filter: Option<Filter>,

    /// Give up after this many status checks
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Give up after this many seconds of polling
    #[arg(long)]
    max_wait_secs: Option<u64>,

    /// Seconds between status checks
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Print the raw report to stdout once the search is ready
    #[arg(long)]
    fetch: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn submission_params(&self) -> Result<SubmissionParams> {
        let mut params = SubmissionParams::new(&self.query, &self.database, self.program)
            .with_format(self.format);

        let opts = &mut params.options;
        opts.expect = self.expect;
        opts.reward = self.reward;
        opts.penalty = self.penalty;
        opts.gap_costs = self.gap_costs;
        opts.matrix = self.matrix;
        opts.hitlist_size = self.hitlist_size;
        opts.descriptions = self.descriptions;
        opts.alignments = self.alignments;
        opts.ncbi_gi = self.ncbi_gi;
        opts.threshold = self.threshold;
        opts.word_size = self.word_size;
        opts.filter = self.filter;
        opts.composition_stats = self
            .comp_stats
            .map(CompositionStats::try_from)
            .transpose()?;

        params.validate()?;
        Ok(params)
    }

    fn poll_policy(&self) -> PollPolicy {
        let mut policy = PollPolicy::default();
        if let Some(secs) = self.interval_secs {
            policy = policy.with_interval(Duration::from_secs(secs));
        }
        if let Some(attempts) = self.max_attempts {
            policy = policy.with_max_attempts(attempts);
        }
        if let Some(secs) = self.max_wait_secs {
            policy = policy.with_max_wait(Duration::from_secs(secs));
        }
        policy
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'a JobOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    results_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,blast_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let client = BlastClient::from_env().context("Failed to configure BLAST client")?;
    let params = cli.submission_params().context("Invalid search parameters")?;
    let policy = cli.poll_policy();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping after the current request");
                cancel.cancel();
            }
        }
    });

    let format = params.format;
    let options = params.options.clone();

    let outcome = match client
        .submit_and_poll_with_cancel(params, &policy, &cancel)
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            report_error(&client, &err, cli.json)?;
            return Err(err).context("BLAST search did not complete");
        }
    };

    report_outcome(&client, &outcome, cli.json)?;

    if outcome.status == JobStatus::Failed {
        bail!("BLAST search {} failed on the server", outcome.request_id);
    }

    if cli.fetch {
        let report = client
            .fetch_results(&outcome.request_id, format, &options)
            .await
            .context("Failed to fetch BLAST report")?;
        std::io::stdout()
            .write_all(&report)
            .context("Failed to write report")?;
    }

    Ok(())
}

fn report_outcome(client: &BlastClient, outcome: &JobOutcome, json: bool) -> Result<()> {
    let url = client.results_reference(&outcome.request_id);

    if json {
        let report = JsonReport {
            success: outcome.status == JobStatus::Ready,
            outcome: Some(outcome),
            rid: Some(outcome.request_id.as_str()),
            results_url: Some(url.to_string()),
            error: None,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let status = match outcome.status {
        JobStatus::Ready => "ready".bright_green().bold(),
        _ => outcome.status.to_string().bright_red().bold(),
    };
    eprintln!(
        "{} {} ({} checks, {:.0}s)",
        "RID".bright_cyan(),
        outcome.request_id,
        outcome.attempts,
        outcome.elapsed.as_secs_f64()
    );
    eprintln!("{} {}", "Status".bright_cyan(), status);
    eprintln!("visit {} to see the results of your BLAST search", url);
    Ok(())
}

fn report_error(client: &BlastClient, err: &JobError, json: bool) -> Result<()> {
    let url = err
        .request_id
        .as_ref()
        .map(|rid| client.results_reference(rid).to_string());

    if json {
        let report = JsonReport {
            success: false,
            outcome: None,
            rid: err.request_id.as_ref().map(|rid| rid.as_str()),
            results_url: url,
            error: Some(err.to_string()),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    eprintln!("{} {}", "Aborted".bright_red().bold(), err);
    if let Some(url) = url {
        eprintln!("the search may still finish; check {}", url);
    }
    Ok(())
}
