use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the order runner
#[derive(Error, Debug)]
pub enum PerpError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Missing secret: environment variable {0} is not set")]
    MissingSecret(String),

    // Strategy authoring errors
    #[error("Validation failed for order '{order}': {source}")]
    Validation {
        order: String,
        #[source]
        source: ValidationError,
    },

    // Execution errors
    #[error("Order '{order}' failed after {attempts} attempt(s): {outcome}")]
    ExecutionFailed {
        order: String,
        attempts: u32,
        outcome: String,
    },

    #[error("Consecutive failures: {count} >= {threshold}")]
    ConsecutiveFailures { count: u32, threshold: u32 },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for PerpError
pub type Result<T> = std::result::Result<T, PerpError>;

impl PerpError {
    pub fn validation(order: impl Into<String>, source: ValidationError) -> Self {
        PerpError::Validation {
            order: order.into(),
            source,
        }
    }
}

/// Reasons an order declaration cannot be resolved
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("ambiguous {quantity}: both {units_field} and {usd_field} supplied")]
    Ambiguous {
        quantity: &'static str,
        units_field: &'static str,
        usd_field: &'static str,
    },

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid custom_parameters: {0}")]
    InvalidCustom(String),

    #[error("{field} cannot be negative: {value}")]
    Negative { field: &'static str, value: Decimal },

    #[error("{field} does not fit in on-chain units: {value} at scale {scale}")]
    Overflow {
        field: &'static str,
        value: Decimal,
        scale: u32,
    },

    #[error("size ${size_usd} below min_size_usd ${min}")]
    BelowMinSize { size_usd: Decimal, min: Decimal },

    #[error("size ${size_usd} above max_size_usd ${max}")]
    AboveMaxSize { size_usd: Decimal, max: Decimal },

    #[error("pair {pair} is not available on {network}")]
    PairUnavailable { pair: String, network: String },

    #[error("unknown {kind}: {name}")]
    UnknownReference { kind: &'static str, name: String },
}

/// Process-level failures surfaced as `ExecutionResult::ProcessError`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("failed to spawn `{program}`: {reason}")]
    Spawn { program: String, reason: String },

    #[error("I/O with child process failed: {0}")]
    Io(String),

    #[error("unexpected CLI output: {0}")]
    PromptMismatch(String),
}

impl SessionError {
    /// Spawn and pipe failures say nothing about the ledger and may be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionError::Spawn { .. } | SessionError::Io(_))
    }
}
