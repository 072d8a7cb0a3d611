//! Normalizes raw query responses

use thiserror::Error;

use super::schema::{QueryStatus, RawQueryResults, MESSAGE_FIELD};

/// The response could not be interpreted
///
/// Not terminal: the poll loop retries on the next tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedResponse {
    #[error("response has no query status")]
    MissingStatus,
    #[error("unexpected query status: {0}")]
    UnknownStatus(String),
}

/// Query state after one poll
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    /// The query reached a terminal state
    pub finished: bool,
    /// Set when the query ended as failed or cancelled
    pub failure_reason: Option<String>,
    /// Backend aggregate of matched records, independent of returned rows
    pub matched_count: u64,
    /// `@message` values of the returned rows, in row order
    pub returned_messages: Vec<String>,
}

/// Classify one raw response
pub fn classify(raw: &RawQueryResults) -> Result<QueryResult, MalformedResponse> {
    let status_str = raw.status.as_deref().ok_or(MalformedResponse::MissingStatus)?;
    let status = QueryStatus::parse(status_str)
        .ok_or_else(|| MalformedResponse::UnknownStatus(status_str.to_string()))?;

    let failure_reason = match status {
        QueryStatus::Failed | QueryStatus::Cancelled => Some(format!(
            "query was finished with `{}` status",
            status.as_str()
        )),
        _ => None,
    };

    let matched_count = raw
        .statistics
        .as_ref()
        .and_then(|s| s.records_matched)
        .filter(|n| n.is_finite() && *n > 0.0)
        .map(|n| n as u64)
        .unwrap_or(0);

    Ok(QueryResult {
        finished: status.is_terminal(),
        failure_reason,
        matched_count,
        returned_messages: message_rows(raw),
    })
}

/// First `@message` value of each row
fn message_rows(raw: &RawQueryResults) -> Vec<String> {
    raw.results
        .iter()
        .filter_map(|row| {
            row.iter()
                .find(|f| f.field.as_deref() == Some(MESSAGE_FIELD) && f.value.is_some())
                .and_then(|f| f.value.clone())
        })
        .collect()
}
