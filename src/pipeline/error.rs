//! Error types and reporting for pipeline stages.

use crate::error::FacetalkError;
use std::fmt;

/// Errors that can occur while a stage processes a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// The request is dropped; the stage keeps serving its queue.
    Recoverable(String),
    /// The stage shuts down after reporting.
    Fatal(String),
}

impl StageError {
    pub fn message(&self) -> &str {
        match self {
            StageError::Recoverable(msg) | StageError::Fatal(msg) => msg,
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageError::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            StageError::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for StageError {}

impl From<FacetalkError> for StageError {
    fn from(error: FacetalkError) -> Self {
        StageError::Recoverable(error.to_string())
    }
}

/// Trait for reporting stage errors.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from a stage.
    fn report(&self, stage: &str, error: &StageError);
}

/// Reporter that logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, stage: &str, error: &StageError) {
        match error {
            StageError::Recoverable(msg) => tracing::warn!(stage, "{}", msg),
            StageError::Fatal(msg) => tracing::error!(stage, "{}", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_display() {
        let recoverable = StageError::Recoverable("temporary failure".to_string());
        assert_eq!(
            recoverable.to_string(),
            "Recoverable error: temporary failure"
        );

        let fatal = StageError::Fatal("critical failure".to_string());
        assert_eq!(fatal.to_string(), "Fatal error: critical failure");
        assert_eq!(fatal.message(), "critical failure");
    }

    #[test]
    fn test_facetalk_error_converts_to_recoverable() {
        let error: StageError = FacetalkError::DeliveryRejected {
            message: "busy".to_string(),
        }
        .into();
        assert_eq!(
            error,
            StageError::Recoverable("Delivery rejected by server: busy".to_string())
        );
    }

    #[test]
    fn test_log_reporter() {
        let reporter = LogReporter;
        // Just ensure it doesn't panic
        reporter.report("synthesis", &StageError::Recoverable("test error".to_string()));
        reporter.report("synthesis", &StageError::Fatal("test error".to_string()));
    }
}
