//! [`QueryClient`] backed by the AWS CLI
//!
//! Credentials and region come from the ambient AWS configuration
//! (`AWS_PROFILE`, `AWS_REGION`, instance profile, ...), exactly as the `aws`
//! command resolves them.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::client::{ClientError, QueryClient, QueryHandle, QueryRequest};
use super::schema::{RawQueryResults, StartQueryResponse};

/// Runs `aws logs ...` subcommands and decodes their JSON output
#[derive(Debug, Clone)]
pub struct AwsCliClient {
    program: String,
}

impl AwsCliClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run_json<T: DeserializeOwned>(&self, args: Vec<String>) -> Result<T, ClientError> {
        let command = format!("{} {}", self.program, args.first().map(String::as_str).unwrap_or(""));
        debug!("Running {} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .arg("logs")
            .args(&args)
            .args(["--output", "json"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ClientError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ClientError::Command {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|source| ClientError::Decode { command, source })
    }
}

/// Arguments for `aws logs start-query`
fn start_query_args(request: &QueryRequest) -> Vec<String> {
    let mut args = vec!["start-query".to_string(), "--log-group-names".to_string()];
    args.extend(request.log_group_names.iter().cloned());
    args.extend([
        "--start-time".to_string(),
        request.window.start.timestamp().to_string(),
        "--end-time".to_string(),
        request.window.end.timestamp().to_string(),
        "--query-string".to_string(),
        request.query_string.clone(),
        "--limit".to_string(),
        request.limit.to_string(),
    ]);
    args
}

fn query_id_args(subcommand: &str, handle: &QueryHandle) -> Vec<String> {
    vec![
        subcommand.to_string(),
        "--query-id".to_string(),
        handle.as_str().to_string(),
    ]
}

#[async_trait]
impl QueryClient for AwsCliClient {
    async fn submit(&self, request: &QueryRequest) -> Result<QueryHandle, ClientError> {
        let resp: StartQueryResponse = self.run_json(start_query_args(request)).await?;
        Ok(QueryHandle::new(resp.query_id))
    }

    async fn poll(&self, handle: &QueryHandle) -> Result<RawQueryResults, ClientError> {
        self.run_json(query_id_args("get-query-results", handle)).await
    }

    async fn cancel(&self, handle: &QueryHandle) -> Result<(), ClientError> {
        let _: serde_json::Value = self.run_json(query_id_args("stop-query", handle)).await?;
        Ok(())
    }
}
