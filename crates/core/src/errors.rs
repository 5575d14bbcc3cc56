use thiserror::Error;

/// Shared failure taxonomy for the conversational core.
///
/// Propagation rules:
/// - `Validation` and `NotFound` surface to the calling administrative
///   operation (ingest, delete, escalate).
/// - `Provider` during a live turn never aborts the turn; retrieval degrades
///   to empty context and escalation degrades to a decline message.
/// - `Configuration` fails only the affected capability and is reported as
///   "capability unavailable", not as a turn failure.
/// - `Timeout` occurs only inside the analysis scheduler and is swallowed
///   after logging.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("provider failure during {operation}: {detail}")]
    Provider { operation: &'static str, detail: String },
    #[error("configuration missing: {0}")]
    Configuration(String),
    #[error("operation timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    pub fn provider(operation: &'static str, detail: impl ToString) -> Self {
        Self::Provider { operation, detail: detail.to_string() }
    }

    /// Whether a live chat turn may surface this error to its administrative
    /// caller. Provider and timeout failures always degrade instead.
    pub fn is_reportable(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound { .. })
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
