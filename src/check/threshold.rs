//! Threshold evaluation of matched message counts

use super::severity::{CheckOutcome, Severity};
use crate::insights::QueryResult;

/// Counts strictly above these trigger the corresponding severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Thresholds {
    pub warning_over: u64,
    pub critical_over: u64,
}

/// Map a matched count onto a severity
///
/// A count equal to a threshold does not trigger it.
pub fn evaluate(matched_count: u64, warning_over: u64, critical_over: u64) -> CheckOutcome {
    if matched_count > critical_over {
        CheckOutcome::new(
            Severity::Critical,
            format!("{} > {} messages", matched_count, critical_over),
        )
    } else if matched_count > warning_over {
        CheckOutcome::new(
            Severity::Warning,
            format!("{} > {} messages", matched_count, warning_over),
        )
    } else {
        CheckOutcome::new(Severity::Ok, format!("{} messages", matched_count))
    }
}

/// Evaluate a finished query, appending captured messages to non-OK outcomes
pub fn outcome_for(result: &QueryResult, thresholds: &Thresholds, return_messages: bool) -> CheckOutcome {
    let mut outcome = evaluate(
        result.matched_count,
        thresholds.warning_over,
        thresholds.critical_over,
    );
    if outcome.severity != Severity::Ok && return_messages {
        for message in &result.returned_messages {
            outcome.message.push('\n');
            outcome.message.push_str(message);
        }
    }
    outcome
}
