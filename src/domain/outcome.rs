use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Terminal outcome of one submission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The CLI printed a success marker
    Confirmed { detail: String },
    /// The counterparty explicitly refused the transaction
    Rejected { reason: String },
    /// No recognized prompt or marker within the wait bound.
    /// `submitted` is set once a confirmation has been answered, after which
    /// the transaction may already be on its way to the ledger.
    TimedOut { waited: Duration, submitted: bool },
    /// The process could not be driven to a terminal marker
    ProcessError(SessionError),
}

/// Outcome category recorded in the run log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Confirmed,
    Rejected,
    TimedOut,
    ProcessError,
    ValidationError,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Confirmed => "confirmed",
            OutcomeKind::Rejected => "rejected",
            OutcomeKind::TimedOut => "timed_out",
            OutcomeKind::ProcessError => "process_error",
            OutcomeKind::ValidationError => "validation_error",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ExecutionResult {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            ExecutionResult::Confirmed { .. } => OutcomeKind::Confirmed,
            ExecutionResult::Rejected { .. } => OutcomeKind::Rejected,
            ExecutionResult::TimedOut { .. } => OutcomeKind::TimedOut,
            ExecutionResult::ProcessError(_) => OutcomeKind::ProcessError,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, ExecutionResult::Confirmed { .. })
    }

    /// Spawn/io failures and timeouts before any confirmation was answered.
    /// A silent CLI may still have broadcast once it got its password; that
    /// risk is accepted, a confirmed submission is never repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExecutionResult::TimedOut { submitted, .. } => !submitted,
            ExecutionResult::ProcessError(err) => err.is_transient(),
            ExecutionResult::Confirmed { .. } | ExecutionResult::Rejected { .. } => false,
        }
    }

    pub fn detail(&self) -> String {
        match self {
            ExecutionResult::Confirmed { detail } => detail.clone(),
            ExecutionResult::Rejected { reason } => reason.clone(),
            ExecutionResult::TimedOut { waited, submitted } => {
                let mut detail =
                    format!("no recognized output within {}s", waited.as_secs_f64());
                if *submitted {
                    detail.push_str(" after confirming submission");
                }
                detail
            }
            ExecutionResult::ProcessError(err) => err.to_string(),
        }
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.detail())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(ExecutionResult::TimedOut {
            waited: Duration::from_secs(1),
            submitted: false,
        }
        .is_retryable());
        assert!(!ExecutionResult::TimedOut {
            waited: Duration::from_secs(1),
            submitted: true,
        }
        .is_retryable());
        assert!(ExecutionResult::ProcessError(SessionError::Spawn {
            program: "supra".into(),
            reason: "No such file".into(),
        })
        .is_retryable());
        assert!(!ExecutionResult::ProcessError(SessionError::PromptMismatch(
            "exited without marker".into()
        ))
        .is_retryable());
        assert!(!ExecutionResult::Rejected {
            reason: "EINSUFFICIENT_BALANCE".into()
        }
        .is_retryable());
        assert!(!ExecutionResult::Confirmed {
            detail: "ok".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(
            ExecutionResult::TimedOut {
                waited: Duration::from_secs(2),
                submitted: false,
            }
            .kind()
            .as_str(),
            "timed_out"
        );
        assert_eq!(
            serde_json::to_string(&OutcomeKind::ValidationError).unwrap(),
            "\"validation_error\""
        );
    }

    #[test]
    fn test_timeout_detail_mentions_submission() {
        let outcome = ExecutionResult::TimedOut {
            waited: Duration::from_secs(3),
            submitted: true,
        };
        assert_eq!(
            outcome.to_string(),
            "timed_out: no recognized output within 3s after confirming submission"
        );
    }
}
