//! Scripted [`QueryClient`] for tests

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::client::{ClientError, QueryClient, QueryHandle, QueryRequest};
use super::schema::RawQueryResults;

/// Replays canned poll responses, then reports `Running` forever
#[derive(Default)]
pub(crate) struct ScriptedClient {
    pub fail_submit: bool,
    /// `cancel` never returns, simulating a stuck cleanup
    pub hang_on_cancel: bool,
    pub fail_cancel: bool,
    /// Each `poll` takes this long before answering
    pub poll_delay: Option<Duration>,
    pub responses: Mutex<VecDeque<Result<RawQueryResults, ClientError>>>,
    pub requests: Mutex<Vec<QueryRequest>>,
    pub polls: AtomicUsize,
    pub cancels: AtomicUsize,
}

impl ScriptedClient {
    pub fn with_responses(responses: Vec<Result<serde_json::Value, &str>>) -> Self {
        let responses = responses
            .into_iter()
            .map(|r| match r {
                Ok(v) => Ok(serde_json::from_value(v).unwrap()),
                Err(msg) => Err(ClientError::Other(msg.to_string())),
            })
            .collect();
        Self {
            responses: Mutex::new(responses),
            ..Default::default()
        }
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

pub(crate) fn complete_response() -> serde_json::Value {
    json!({
        "status": "Complete",
        "results": [[{"field": "@message", "value": "omg something happened"}]],
        "statistics": {"recordsMatched": 6.0}
    })
}

#[async_trait]
impl QueryClient for ScriptedClient {
    async fn submit(&self, request: &QueryRequest) -> Result<QueryHandle, ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_submit {
            return Err(ClientError::Other("AccessDeniedException".into()));
        }
        Ok(QueryHandle::new("query-1"))
    }

    async fn poll(&self, handle: &QueryHandle) -> Result<RawQueryResults, ClientError> {
        assert_eq!(handle.as_str(), "query-1");
        self.polls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.poll_delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(serde_json::from_value(json!({"status": "Running"})).unwrap()))
    }

    async fn cancel(&self, _handle: &QueryHandle) -> Result<(), ClientError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        if self.hang_on_cancel {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_cancel {
            return Err(ClientError::Other("InvalidParameterException".into()));
        }
        Ok(())
    }
}
