//! CloudWatch Logs Insights search
//!
//! Plans the next query window from the persisted cursor, runs the query through a
//! [`QueryClient`] and normalizes the backend's answer.

pub mod aws_cli;
pub mod classifier;
pub mod client;
pub mod poller;
pub mod schema;
pub mod window;

pub use aws_cli::AwsCliClient;
pub use classifier::{classify, MalformedResponse, QueryResult};
pub use client::{ClientError, QueryClient, QueryHandle, QueryRequest};
pub use poller::{LogSearch, SearchError, SearchSettings, DEFAULT_RESULT_LIMIT};
pub use schema::{QueryStatus, RawQueryResults};
pub use window::{plan, TimeWindow, WindowPolicy};

#[cfg(test)]
pub(crate) mod testing;
