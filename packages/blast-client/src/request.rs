//! Request construction for the BLAST URL API.
//!
//! Pure functions: nothing here touches the network. Every set field maps to
//! exactly one URL parameter and unset optional fields are left out entirely.
//! Values are form-urlencoded when the request is serialized, so newlines or
//! `&` inside a FASTA query cannot leak into neighbouring parameters.

use url::form_urlencoded;
use url::Url;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::params::{FormatObject, FormatType, Program, SearchOptions, SubmissionParams};
use crate::types::RequestId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A transport-level request: method, endpoint and ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BlastRequest {
    pub method: Method,
    pub base_url: Url,
    pub params: Vec<(&'static str, String)>,
}

impl BlastRequest {
    fn new(method: Method, base_url: &Url, cmd: &str) -> Self {
        Self {
            method,
            base_url: base_url.clone(),
            params: vec![("CMD", cmd.to_string())],
        }
    }

    fn push(&mut self, name: &'static str, value: impl ToString) {
        self.params.push((name, value.to_string()));
    }

    fn push_opt<T: ToString>(&mut self, name: &'static str, value: Option<T>) {
        if let Some(value) = value {
            self.push(name, value);
        }
    }

    /// Value of a parameter, if it was set.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Parameters as an `application/x-www-form-urlencoded` string.
    pub fn encoded_params(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.params {
            serializer.append_pair(name, value);
        }
        serializer.finish()
    }

    /// Full URL. GET requests carry their parameters in the query string.
    pub fn url(&self) -> Url {
        let mut url = self.base_url.clone();
        if self.method == Method::Get {
            url.set_query(Some(&self.encoded_params()));
        }
        url
    }

    /// Form body for POST requests.
    pub fn body(&self) -> Option<String> {
        match self.method {
            Method::Post => Some(self.encoded_params()),
            Method::Get => None,
        }
    }
}

/// Build the `CMD=Put` submission. Validates `params` first.
pub fn build_submission_request(
    config: &ClientConfig,
    params: &SubmissionParams,
) -> Result<BlastRequest> {
    params.validate()?;

    let mut req = BlastRequest::new(Method::Post, &config.base_url, "Put");
    req.push("QUERY", &params.query);
    req.push("DATABASE", &params.database);
    req.push("PROGRAM", params.program.wire_name());
    if params.program == Program::Megablast {
        req.push("MEGABLAST", "on");
    }
    req.push("FORMAT_TYPE", params.format.as_str());

    let opts = &params.options;
    req.push_opt("FILTER", opts.filter.map(|f| f.to_param()));
    req.push_opt("EXPECT", opts.expect);
    req.push_opt("NUCL_REWARD", opts.reward);
    req.push_opt("NUCL_PENALTY", opts.penalty);
    req.push_opt("GAPCOSTS", opts.gap_costs.map(|g| g.to_param()));
    req.push_opt("MATRIX", opts.matrix.map(|m| m.as_str()));
    push_report_options(&mut req, opts);
    req.push_opt("THRESHOLD", opts.threshold);
    req.push_opt("WORD_SIZE", opts.word_size);
    req.push_opt(
        "COMPOSITION_BASED_STATISTICS",
        opts.composition_stats.map(|c| c as u8),
    );

    req.push_opt("TOOL", config.tool.as_deref());
    req.push_opt("EMAIL", config.email.as_deref());

    Ok(req)
}

/// Build the `CMD=Get&FORMAT_OBJECT=SearchInfo` status check.
pub fn build_status_request(
    config: &ClientConfig,
    rid: &RequestId,
    format: FormatType,
) -> BlastRequest {
    let mut req = BlastRequest::new(Method::Get, &config.base_url, "Get");
    req.push("FORMAT_OBJECT", FormatObject::SearchInfo.as_str());
    req.push("RID", rid);
    req.push("FORMAT_TYPE", format.as_str());
    req
}

/// Build the `CMD=Get` report retrieval. Only the knobs valid on Get are sent.
pub fn build_results_request(
    config: &ClientConfig,
    rid: &RequestId,
    format: FormatType,
    options: &SearchOptions,
) -> BlastRequest {
    let mut req = BlastRequest::new(Method::Get, &config.base_url, "Get");
    req.push("RID", rid);
    req.push("FORMAT_TYPE", format.as_str());
    push_report_options(&mut req, options);
    req
}

/// Build the `CMD=Delete` request that releases a search on the server.
pub fn build_delete_request(config: &ClientConfig, rid: &RequestId) -> BlastRequest {
    let mut req = BlastRequest::new(Method::Get, &config.base_url, "Delete");
    req.push("RID", rid);
    req
}

/// Browser-facing link to the results page for `rid`. Performs no I/O.
pub fn results_reference_for(base_url: &Url, rid: &RequestId) -> Url {
    let mut url = base_url.clone();
    url.query_pairs_mut()
        .clear()
        .append_pair("CMD", "Get")
        .append_pair("RID", rid.as_str());
    url
}

fn push_report_options(req: &mut BlastRequest, opts: &SearchOptions) {
    req.push_opt("HITLIST_SIZE", opts.hitlist_size);
    req.push_opt("DESCRIPTIONS", opts.descriptions);
    req.push_opt("ALIGNMENTS", opts.alignments);
    req.push_opt("NCBI_GI", opts.ncbi_gi.map(|show| if show { "T" } else { "F" }));
}
