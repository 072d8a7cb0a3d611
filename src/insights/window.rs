//! Query window planning
//!
//! Consecutive invocations scan the log stream as a chain of half-open windows:
//! each window starts where the previous one ended, unless the previous cursor is
//! missing, unusable or too old.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use tracing::{debug, warn};

use crate::state::Cursor;

/// Half-open `[start, end)` time range of one query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Cursor to persist once this window has been attempted
    pub fn next_cursor(&self) -> Cursor {
        Cursor::new(self.end)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Timing parameters for window planning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    /// Delay before recent events become queryable
    pub ingestion_lag: Duration,
    /// Window length used on cold start or after discarding a cursor
    pub min_window: Duration,
    /// Oldest cursor that may still be continued from
    pub max_backfill: Duration,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            ingestion_lag: Duration::minutes(5),
            min_window: Duration::minutes(1),
            max_backfill: Duration::minutes(90),
        }
    }
}

/// Plan the next query window
///
/// Never fails: a missing, stale or out-of-order cursor falls back to a
/// `min_window`-long window ending at `now - ingestion_lag`.
pub fn plan(now: DateTime<Utc>, prior: Option<&Cursor>, policy: &WindowPolicy) -> TimeWindow {
    let end = truncate_to_seconds(now - policy.ingestion_lag);
    let fallback = TimeWindow {
        start: end - policy.min_window,
        end,
    };

    let Some(prior) = prior else {
        debug!("No prior cursor, using {}s fallback window", policy.min_window.num_seconds());
        return fallback;
    };

    let last_end = prior.last_window_end;
    if last_end >= end {
        warn!(
            "Ignoring cursor {} at or after window end {}",
            last_end.to_rfc3339(),
            end.to_rfc3339()
        );
        return fallback;
    }
    if end - last_end > policy.max_backfill {
        warn!(
            "Ignoring cursor {} since it is older than {}s",
            last_end.to_rfc3339(),
            policy.max_backfill.num_seconds()
        );
        return fallback;
    }

    TimeWindow {
        start: last_end,
        end,
    }
}

fn truncate_to_seconds(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(t.timestamp(), 0).unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_cold_start_uses_fallback() {
        let window = plan(at(NOW), None, &WindowPolicy::default());
        assert_eq!(window.end, at(NOW - 300));
        assert_eq!(window.start, at(NOW - 360));
    }

    #[test]
    fn test_continues_from_prior_cursor() {
        let prior = Cursor::new(at(NOW - 900));
        let window = plan(at(NOW), Some(&prior), &WindowPolicy::default());
        assert_eq!(window.start, prior.last_window_end);
        assert_eq!(window.end, at(NOW - 300));
    }

    #[test]
    fn test_cursor_exactly_at_horizon_is_kept() {
        let policy = WindowPolicy::default();
        let end = NOW - 300;
        let prior = Cursor::new(at(end - 90 * 60));
        let window = plan(at(NOW), Some(&prior), &policy);
        assert_eq!(window.start, prior.last_window_end);
    }

    #[test]
    fn test_stale_cursor_is_discarded() {
        let policy = WindowPolicy::default();
        let end = NOW - 300;
        let prior = Cursor::new(at(end - 90 * 60 - 1));
        let window = plan(at(NOW), Some(&prior), &policy);
        assert_eq!(window.start, at(end - 60));
        assert_eq!(window.end, at(end));
    }

    #[test]
    fn test_cursor_in_future_is_discarded() {
        let prior = Cursor::new(at(NOW + 3600));
        let window = plan(at(NOW), Some(&prior), &WindowPolicy::default());
        assert_eq!(window.start, at(NOW - 360));
        assert!(window.start < window.end);
    }

    #[test]
    fn test_cursor_equal_to_end_is_discarded() {
        let prior = Cursor::new(at(NOW - 300));
        let window = plan(at(NOW), Some(&prior), &WindowPolicy::default());
        assert_eq!(window.end - window.start, Duration::minutes(1));
    }

    #[test]
    fn test_subsecond_now_is_truncated() {
        let now = at(NOW) + Duration::milliseconds(750);
        let window = plan(now, None, &WindowPolicy::default());
        assert_eq!(window.end, at(NOW - 300));
        assert_eq!(window.next_cursor(), Cursor::new(at(NOW - 300)));
    }

    #[test]
    fn test_consecutive_windows_are_contiguous() {
        let policy = WindowPolicy::default();
        let first = plan(at(NOW), None, &policy);
        let second = plan(at(NOW + 120), Some(&first.next_cursor()), &policy);
        assert_eq!(second.start, first.end);
        assert_eq!(second.end - second.start, Duration::minutes(2));
    }

    #[test]
    fn test_custom_policy() {
        let policy = WindowPolicy {
            ingestion_lag: Duration::seconds(30),
            min_window: Duration::minutes(10),
            max_backfill: Duration::minutes(20),
        };
        let window = plan(at(NOW), None, &policy);
        assert_eq!(window.end, at(NOW - 30));
        assert_eq!(window.start, at(NOW - 630));
    }
}
