//! Query submission and polling
//!
//! Drives one query from submission to a terminal state while watching for an
//! external interrupt. The cursor for the planned window is persisted on every
//! exit path after a successful submission, whether the query succeeded, failed
//! or was interrupted, so a failing window is never retried forever.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::classifier::{classify, QueryResult};
use super::client::{ClientError, QueryClient, QueryHandle, QueryRequest};
use super::schema::MESSAGE_FIELD;
use super::window::{plan, WindowPolicy};
use crate::state::{Cursor, CursorError, CursorStore};

/// Default number of rows requested per query
pub const DEFAULT_RESULT_LIMIT: u32 = 10;

/// Errors that end a search
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("failed to start query: {0}")]
    Submission(#[source] ClientError),
    #[error("{0}")]
    RemoteFailure(String),
    #[error("failed to save cursor: {0}")]
    CursorPersist(#[source] CursorError),
    #[error("execution cancelled")]
    Cancelled,
    #[error("query did not finish within {}s", .0.as_secs())]
    DeadlineExceeded(Duration),
}

/// What to search and how
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub log_group_names: Vec<String>,
    /// Logs Insights filter expression
    pub filter: String,
    /// Capture matched messages for the check output
    pub return_messages: bool,
    pub result_limit: u32,
    pub window: WindowPolicy,
    /// Give up waiting after this long; `None` waits until interrupted
    pub timeout: Option<Duration>,
}

impl SearchSettings {
    pub fn new(log_group_names: Vec<String>, filter: impl Into<String>) -> Self {
        Self {
            log_group_names,
            filter: filter.into(),
            return_messages: false,
            result_limit: DEFAULT_RESULT_LIMIT,
            window: WindowPolicy::default(),
            timeout: None,
        }
    }

    /// Filter plus an explicit `fields @message` when messages are captured
    pub fn query_string(&self) -> String {
        if self.return_messages {
            format!("{} | fields {}", self.filter, MESSAGE_FIELD)
        } else {
            self.filter.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Cancelled,
    Deadline(Duration),
}

impl From<Interrupt> for SearchError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Cancelled => SearchError::Cancelled,
            Interrupt::Deadline(timeout) => SearchError::DeadlineExceeded(timeout),
        }
    }
}

/// Resolves when the token is cancelled or the deadline passes
async fn interrupted(cancel: &CancellationToken, deadline: Option<(Instant, Duration)>) -> Interrupt {
    match deadline {
        Some((at, timeout)) => tokio::select! {
            _ = cancel.cancelled() => Interrupt::Cancelled,
            _ = tokio::time::sleep_until(at) => Interrupt::Deadline(timeout),
        },
        None => {
            cancel.cancelled().await;
            Interrupt::Cancelled
        }
    }
}

/// One cursor-continued log search
pub struct LogSearch {
    client: Arc<dyn QueryClient>,
    store: CursorStore,
    settings: SearchSettings,
}

impl LogSearch {
    pub fn new(client: Arc<dyn QueryClient>, store: CursorStore, settings: SearchSettings) -> Self {
        Self {
            client,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Run the search for the window ending shortly before `now`
    ///
    /// `interval` is the fixed delay between status polls. Returns when the query
    /// reaches a terminal state, `cancel` fires, or the configured timeout elapses.
    pub async fn run(
        &self,
        now: DateTime<Utc>,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<QueryResult, SearchError> {
        let deadline = self
            .settings
            .timeout
            .and_then(|timeout| Instant::now().checked_add(timeout).map(|at| (at, timeout)));

        let prior = self.load_cursor().await;
        let window = plan(now, prior.as_ref(), &self.settings.window);
        let next_cursor = window.next_cursor();

        let request = QueryRequest {
            log_group_names: self.settings.log_group_names.clone(),
            query_string: self.settings.query_string(),
            window,
            limit: self.settings.result_limit,
        };
        debug!("Start query {:?}", request);

        let handle = tokio::select! {
            biased;
            interrupt = interrupted(cancel, deadline) => {
                info!("Execution interrupted before the query was started");
                return Err(interrupt.into());
            }
            submitted = self.client.submit(&request) => {
                submitted.map_err(SearchError::Submission)?
            }
        };
        debug!("Started query {} for window {}", handle, window);

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                interrupt = interrupted(cancel, deadline) => {
                    return Err(self.abandon(&handle, &next_cursor, interrupt).await);
                }
                _ = ticker.tick() => {}
            }

            debug!("Try to get query results...");
            let polled = tokio::select! {
                biased;
                interrupt = interrupted(cancel, deadline) => {
                    return Err(self.abandon(&handle, &next_cursor, interrupt).await);
                }
                polled = self.client.poll(&handle) => polled,
            };

            let raw = match polled {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Getting query results failed (will retry): {}", e);
                    continue;
                }
            };
            let mut result = match classify(&raw) {
                Ok(result) => result,
                Err(e) => {
                    warn!("Failed to parse query results (will retry): {}", e);
                    continue;
                }
            };
            if !result.finished {
                debug!("Query not finished, will wait a while...");
                continue;
            }
            debug!("Query finished: {:?}", result);

            if let Some(reason) = result.failure_reason.take() {
                if let Err(e) = self.save_cursor(next_cursor).await {
                    error!("Failed to save cursor: {}", e);
                }
                return Err(SearchError::RemoteFailure(reason));
            }

            self.save_cursor(next_cursor)
                .await
                .map_err(SearchError::CursorPersist)?;
            if !self.settings.return_messages {
                result.returned_messages.clear();
            }
            return Ok(result);
        }
    }

    /// Unreadable cursors are treated as absent
    async fn load_cursor(&self) -> Option<Cursor> {
        let store = self.store.clone();
        let loaded = tokio::task::spawn_blocking(move || store.load())
            .await
            .unwrap_or_else(|e| {
                Err(CursorError::Read {
                    path: self.store.path().to_path_buf(),
                    source: std::io::Error::other(e),
                })
            });
        match loaded {
            Ok(cursor) => cursor,
            Err(e) => {
                warn!("Ignoring unreadable cursor: {}", e);
                None
            }
        }
    }

    /// Write the cursor off the async worker; `save` syncs to disk
    async fn save_cursor(&self, cursor: Cursor) -> Result<(), CursorError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.save(&cursor))
            .await
            .unwrap_or_else(|e| {
                Err(CursorError::Write {
                    path: self.store.path().to_path_buf(),
                    source: std::io::Error::other(e),
                })
            })
    }

    /// Persist the attempted window and stop the running query
    async fn abandon(&self, handle: &QueryHandle, next_cursor: &Cursor, interrupt: Interrupt) -> SearchError {
        info!("Execution interrupted, stopping query {}", handle);
        if let Err(e) = self.save_cursor(*next_cursor).await {
            error!("Failed to save cursor: {}", e);
        }
        match self.client.cancel(handle).await {
            Ok(()) => debug!("Stopped query {}", handle),
            Err(e) => error!("Failed to stop the running query: {}", e),
        }
        interrupt.into()
    }
}
