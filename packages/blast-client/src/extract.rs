//! Marker scanning over raw response bodies.
//!
//! The service embeds out-of-band data in its HTML pages in two shapes:
//!
//! ```text
//! <input type="hidden" name="RID" value="7X5Z9ABC016" id="rid">
//!
//! <!--QBlastInfoBegin
//!     RID = 7X5Z9ABC016
//!     RTOE = 27
//! QBlastInfoEnd
//! -->
//! ```
//!
//! Neither needs a markup parser. The attribute form is found by searching for
//! the `name="<FIELD>" value=` prefix and capturing the bytes between the next
//! two `"` characters. Every index is bounds-checked, so a truncated body ends
//! the scan instead of reading past the buffer.

use std::time::Duration;

use tracing::warn;

use crate::error::{BlastError, Result};
use crate::types::{JobStatus, RequestId};

const RID_MARKER: &str = "RID";
const STATUS_MARKER: &str = "Status";
const QBLAST_INFO_BEGIN: &[u8] = b"QBlastInfoBegin";
const QBLAST_INFO_END: &[u8] = b"QBlastInfoEnd";

/// Extract the request identifier from a submission response.
///
/// Fails with `IdentifierNotFound` when neither marker shape is present and
/// with `MalformedResponse` when the attribute marker is present but its
/// value is unterminated, empty or not UTF-8.
pub fn extract_request_id(body: &[u8]) -> Result<RequestId> {
    match attribute_value(body, RID_MARKER)? {
        Some(raw) => {
            let value = std::str::from_utf8(raw)
                .map_err(|_| BlastError::MalformedResponse { marker: RID_MARKER })?;
            RequestId::new(value.trim())
                .map_err(|_| BlastError::MalformedResponse { marker: RID_MARKER })
        }
        None => qblast_info_value(body, RID_MARKER)
            .and_then(|value| RequestId::new(value).ok())
            .ok_or(BlastError::IdentifierNotFound { marker: RID_MARKER }),
    }
}

/// Extract the job status from a status-check response.
///
/// Never fails: a missing, malformed or unrecognised status maps to `Unknown`
/// so new transient states on the service side do not abort polling.
pub fn extract_status(body: &[u8]) -> JobStatus {
    let token = match attribute_value(body, STATUS_MARKER) {
        Ok(Some(raw)) => Some(String::from_utf8_lossy(raw).into_owned()),
        Ok(None) => qblast_info_value(body, STATUS_MARKER),
        Err(_) => None,
    };

    match token {
        Some(token) => {
            let status = JobStatus::from_token(&token);
            if status == JobStatus::Unknown {
                warn!(token = %token, "unrecognised job status");
            }
            status
        }
        None => {
            warn!("no status marker in response");
            JobStatus::Unknown
        }
    }
}

/// Estimated time to completion (`RTOE`) advertised on the submission page.
pub fn extract_estimated_wait(body: &[u8]) -> Option<Duration> {
    qblast_info_value(body, "RTOE")?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Value of a `name="<field>" value="..."` marker.
///
/// `Ok(None)` when the prefix is absent; `MalformedResponse` when the prefix
/// is present but the quoted value never opens or never closes.
fn attribute_value<'a>(body: &'a [u8], field: &'static str) -> Result<Option<&'a [u8]>> {
    let prefix = format!("name=\"{}\" value=", field);
    let Some(start) = find(body, prefix.as_bytes()) else {
        return Ok(None);
    };
    let malformed = || BlastError::MalformedResponse { marker: field };

    let mut idx = start + prefix.len();
    while idx < body.len() && body[idx].is_ascii_whitespace() {
        idx += 1;
    }
    if idx >= body.len() || body[idx] != b'"' {
        return Err(malformed());
    }

    let value_start = idx + 1;
    let len = body[value_start..]
        .iter()
        .position(|&b| b == b'"')
        .ok_or_else(malformed)?;

    Ok(Some(&body[value_start..value_start + len]))
}

/// Value of a `key = value` line inside the `QBlastInfoBegin`/`QBlastInfoEnd` comment.
fn qblast_info_value(body: &[u8], key: &str) -> Option<String> {
    let begin = find(body, QBLAST_INFO_BEGIN)? + QBLAST_INFO_BEGIN.len();
    let block = &body[begin..];
    let block = match find(block, QBLAST_INFO_END) {
        Some(end) => &block[..end],
        None => block,
    };

    String::from_utf8_lossy(block).lines().find_map(|line| {
        let (name, value) = line.split_once('=')?;
        if name.trim() == key {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
