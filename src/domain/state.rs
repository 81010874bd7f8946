use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of output pattern a session reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// Error marker: the counterparty refused the transaction
    Error,
    /// Success marker: the transaction was accepted
    Success,
    /// Password / passphrase prompt
    Password,
    /// Interactive confirmation prompt
    Confirmation,
}

impl PromptKind {
    /// Scan priority when two patterns match at the same position
    pub const PRIORITY: [PromptKind; 4] = [
        PromptKind::Error,
        PromptKind::Success,
        PromptKind::Password,
        PromptKind::Confirmation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::Error => "ERROR",
            PromptKind::Success => "SUCCESS",
            PromptKind::Password => "PASSWORD",
            PromptKind::Confirmation => "CONFIRMATION",
        }
    }

    /// Terminal markers end the scripted dialogue
    pub fn is_terminal_marker(&self) -> bool {
        matches!(self, PromptKind::Error | PromptKind::Success)
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Process session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Created, nothing spawned yet
    Idle,
    /// Child process started
    Spawned,
    /// Scanning output for the next recognized pattern
    AwaitingPrompt,
    /// A pattern matched; its scripted response is being applied
    Matched(PromptKind),
    /// Success marker seen and the process released
    Completed,
    /// Error marker, unexpected output, or I/O failure
    Failed,
    /// Wait bound exceeded
    TimedOut,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "IDLE",
            SessionState::Spawned => "SPAWNED",
            SessionState::AwaitingPrompt => "AWAITING_PROMPT",
            SessionState::Matched(_) => "MATCHED",
            SessionState::Completed => "COMPLETED",
            SessionState::Failed => "FAILED",
            SessionState::TimedOut => "TIMED_OUT",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;

        if self.is_terminal() {
            return false;
        }

        match (self, target) {
            // Failure is reachable from every live state
            (_, Failed) | (_, TimedOut) => true,

            (Idle, Spawned) => true,
            (Spawned, AwaitingPrompt) => true,
            (AwaitingPrompt, Matched(_)) => true,

            // Scripted response sent, keep scanning
            (Matched(kind), AwaitingPrompt) => !kind.is_terminal_marker(),
            (Matched(PromptKind::Success), Completed) => true,

            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::TimedOut
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Matched(kind) => write!(f, "MATCHED({})", kind),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// State transition event (for logging/debugging)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: SessionState,
    pub to: SessionState,
    pub reason: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl StateTransition {
    pub fn new(from: SessionState, to: SessionState, reason: impl Into<String>) -> Self {
        Self {
            from,
            to,
            reason: reason.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}
