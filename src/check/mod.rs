//! Check outcome and threshold evaluation

pub mod severity;
pub mod threshold;

pub use severity::{CheckOutcome, Severity};
pub use threshold::{evaluate, outcome_for, Thresholds};

/// Name printed in front of every status line
pub const CHECK_NAME: &str = "CloudWatch Logs Insights";
