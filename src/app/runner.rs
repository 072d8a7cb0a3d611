//! Check execution and signal supervision

use anyhow::Result;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::config::Config;
use crate::check::{outcome_for, CheckOutcome, Thresholds};
use crate::insights::{LogSearch, QueryClient, SearchSettings};
use crate::state::{default_state_dir, CursorStore, InvocationIdentity};

/// Options taken from the command line
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub log_group_names: Vec<String>,
    pub filter: String,
    pub thresholds: Thresholds,
    pub return_messages: bool,
    /// Overrides `Config::state_dir`
    pub state_dir: Option<PathBuf>,
    /// Overrides `[poll] timeout_secs`
    pub timeout: Option<Duration>,
}

/// A fully wired check, ready to run once
pub struct Check {
    search: LogSearch,
    thresholds: Thresholds,
    interval: Duration,
}

impl Check {
    pub fn new(
        client: Arc<dyn QueryClient>,
        options: &CheckOptions,
        config: &Config,
        identity: &InvocationIdentity,
    ) -> Self {
        let state_dir = options
            .state_dir
            .clone()
            .or_else(|| config.state_dir.clone())
            .unwrap_or_else(default_state_dir);
        let store = CursorStore::for_identity(&state_dir, identity);
        debug!("Using cursor file {}", store.path().display());

        let settings = SearchSettings {
            log_group_names: options.log_group_names.clone(),
            filter: options.filter.clone(),
            return_messages: options.return_messages,
            result_limit: config.query.result_limit,
            window: config.window.policy(),
            timeout: options.timeout.or_else(|| config.poll.timeout()),
        };

        Self {
            search: LogSearch::new(client, store, settings),
            thresholds: options.thresholds,
            interval: config.poll.interval(),
        }
    }

    /// Run the search and evaluate it; every failure becomes UNKNOWN
    pub async fn run(&self, cancel: &CancellationToken) -> CheckOutcome {
        match self.search.run(Utc::now(), self.interval, cancel).await {
            Ok(result) => outcome_for(
                &result,
                &self.thresholds,
                self.search.settings().return_messages,
            ),
            Err(e) => CheckOutcome::unknown(e.to_string()),
        }
    }
}

/// Run `check` until it finishes or a signal arrives
///
/// The first signal cancels the check, which then saves its cursor and stops the
/// remote query before returning. A second signal while that cleanup is still in
/// progress gives up on it.
pub async fn supervise(check: Check, mut signals: mpsc::UnboundedReceiver<()>) -> CheckOutcome {
    let cancel = CancellationToken::new();
    let mut task = tokio::spawn({
        let cancel = cancel.clone();
        async move { check.run(&cancel).await }
    });

    tokio::select! {
        joined = &mut task => return joined_outcome(joined),
        Some(()) = signals.recv() => {}
    }

    info!("Received signal, cancelling the check");
    cancel.cancel();

    tokio::select! {
        joined = &mut task => joined_outcome(joined),
        Some(()) = signals.recv() => {
            error!("Received signal again, force shutdown");
            CheckOutcome::unknown("terminated by signal")
        }
    }
}

fn joined_outcome(joined: Result<CheckOutcome, JoinError>) -> CheckOutcome {
    joined.unwrap_or_else(|e| CheckOutcome::unknown(format!("check task failed: {}", e)))
}

/// Forward SIGINT and SIGTERM into a channel
///
/// Must be called from within a tokio runtime.
pub fn forward_signals() -> Result<mpsc::UnboundedReceiver<()>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = terminate.recv() => {}
                Some(()) = interrupt.recv() => {}
                else => break,
            }
            if tx.send(()).is_err() {
                break;
            }
        }
    });

    Ok(rx)
}
