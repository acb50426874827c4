//! Action failures.
//!
//! The scheduler has exactly one error kind: the caller's action did not
//! produce a value. The error is recorded on the task and never leaves the
//! queue through `enqueue`, `stop` or `resume`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The action returned an error.
    #[error("{0}")]
    Failed(String),

    /// The action panicked while running.
    #[error("action panicked: {0}")]
    Panicked(String),

    /// The action did not settle within the queue's configured timeout.
    #[error("action timed out after {0:?}")]
    TimedOut(Duration),

    /// The action was torn down before settling (runtime shutdown).
    #[error("action was cancelled before it settled")]
    Cancelled,
}

impl ActionError {
    pub fn failed(reason: impl Into<String>) -> Self {
        ActionError::Failed(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_displays_reason_verbatim() {
        let err = ActionError::failed("popup blocked");
        assert_eq!(err.to_string(), "popup blocked");
    }

    #[test]
    fn timed_out_mentions_duration() {
        let err = ActionError::TimedOut(Duration::from_millis(250));
        assert!(err.to_string().contains("250ms"));
    }
}
