//! Wire types for CloudWatch Logs Insights responses

use serde::{Deserialize, Serialize};

/// Field name the backend uses for the raw log line
pub const MESSAGE_FIELD: &str = "@message";

/// Query states reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Scheduled,
    Running,
    Complete,
    Failed,
    Cancelled,
}

impl QueryStatus {
    /// Parse the backend status string; unknown values yield `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Scheduled" => Some(QueryStatus::Scheduled),
            "Running" => Some(QueryStatus::Running),
            "Complete" => Some(QueryStatus::Complete),
            "Failed" => Some(QueryStatus::Failed),
            "Cancelled" => Some(QueryStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Scheduled => "Scheduled",
            QueryStatus::Running => "Running",
            QueryStatus::Complete => "Complete",
            QueryStatus::Failed => "Failed",
            QueryStatus::Cancelled => "Cancelled",
        }
    }

    /// Whether the query can make no further progress
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QueryStatus::Scheduled | QueryStatus::Running)
    }
}

/// One `{field, value}` cell of a result row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultField {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// Aggregate statistics reported alongside the rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStatistics {
    #[serde(default)]
    pub records_matched: Option<f64>,
}

/// Raw `get-query-results` response
///
/// Everything is optional so that a partially malformed payload still decodes and
/// the classifier can decide what to make of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQueryResults {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub results: Vec<Vec<ResultField>>,
    #[serde(default)]
    pub statistics: Option<QueryStatistics>,
}

/// Raw `start-query` response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartQueryResponse {
    pub query_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(QueryStatus::parse("Running"), Some(QueryStatus::Running));
        assert_eq!(QueryStatus::parse("Complete"), Some(QueryStatus::Complete));
        assert_eq!(QueryStatus::parse("Timeout"), None);
        assert_eq!(QueryStatus::parse("complete"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!QueryStatus::Scheduled.is_terminal());
        assert!(!QueryStatus::Running.is_terminal());
        assert!(QueryStatus::Complete.is_terminal());
        assert!(QueryStatus::Failed.is_terminal());
        assert!(QueryStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_deserialize_cli_output() {
        let json = r#"{
            "results": [
                [
                    {"field": "@timestamp", "value": "2024-01-01 00:00:00.000"},
                    {"field": "@message", "value": "ERROR boom"},
                    {"field": "@ptr", "value": "abc"}
                ]
            ],
            "statistics": {"recordsMatched": 3.0, "recordsScanned": 120.0, "bytesScanned": 4096.0},
            "status": "Complete"
        }"#;
        let raw: RawQueryResults = serde_json::from_str(json).unwrap();
        assert_eq!(raw.status.as_deref(), Some("Complete"));
        assert_eq!(raw.results[0][1].value.as_deref(), Some("ERROR boom"));
        assert_eq!(raw.statistics.unwrap().records_matched, Some(3.0));
    }

    #[test]
    fn test_deserialize_without_status() {
        let raw: RawQueryResults = serde_json::from_str(r#"{"results": []}"#).unwrap();
        assert!(raw.status.is_none());
        assert!(raw.statistics.is_none());
    }

    #[test]
    fn test_deserialize_start_query() {
        let resp: StartQueryResponse =
            serde_json::from_str(r#"{"queryId": "12ab3456-12ab-123a-789e-1234567890ab"}"#).unwrap();
        assert_eq!(resp.query_id, "12ab3456-12ab-123a-789e-1234567890ab");
    }
}
