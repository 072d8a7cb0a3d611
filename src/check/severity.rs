use std::fmt;

/// Check severity, ordered from healthy to unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Ok,
    Warning,
    Critical,
    /// Local or transport failure, not the monitored condition
    Unknown,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
            Severity::Unknown => "UNKNOWN",
        }
    }

    /// Conventional monitoring plugin exit code
    pub fn exit_code(&self) -> i32 {
        match self {
            Severity::Ok => 0,
            Severity::Warning => 1,
            Severity::Critical => 2,
            Severity::Unknown => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of one check run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub severity: Severity,
    pub message: String,
}

impl CheckOutcome {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(Severity::Unknown, message)
    }

    /// Status line, e.g. `CloudWatch Logs Insights OK: 0 messages`
    pub fn status_line(&self, name: &str) -> String {
        format!("{} {}: {}", name, self.severity, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Severity::Ok.exit_code(), 0);
        assert_eq!(Severity::Warning.exit_code(), 1);
        assert_eq!(Severity::Critical.exit_code(), 2);
        assert_eq!(Severity::Unknown.exit_code(), 3);
    }

    #[test]
    fn test_status_line() {
        let outcome = CheckOutcome::new(Severity::Critical, "5 > 4 messages");
        assert_eq!(
            outcome.status_line("CloudWatch Logs Insights"),
            "CloudWatch Logs Insights CRITICAL: 5 > 4 messages"
        );
    }
}
