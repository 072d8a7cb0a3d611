//! Remote query client interface
//!
//! The poll loop only talks to the backend through [`QueryClient`], so the AWS CLI
//! backend and the scripted test backend are interchangeable.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use super::schema::RawQueryResults;
use super::window::TimeWindow;

/// Errors raised by a [`QueryClient`] call
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("unexpected response from `{command}`: {source}")]
    Decode {
        command: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Other(String),
}

/// Opaque identifier of a submitted query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryHandle(String);

impl QueryHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything needed to submit one query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub log_group_names: Vec<String>,
    pub query_string: String,
    pub window: TimeWindow,
    /// Maximum number of rows returned
    pub limit: u32,
}

/// Capability to run log queries against the backend
#[async_trait]
pub trait QueryClient: Send + Sync {
    /// Start a query; the returned handle is valid for `poll` and `cancel`
    async fn submit(&self, request: &QueryRequest) -> Result<QueryHandle, ClientError>;

    /// Fetch the current status and any rows of a query
    async fn poll(&self, handle: &QueryHandle) -> Result<RawQueryResults, ClientError>;

    /// Ask the backend to stop a running query
    async fn cancel(&self, handle: &QueryHandle) -> Result<(), ClientError>;
}
