use std::time::Duration;

use thiserror::Error;

/// Caller errors in a snapshot request. These are never papered over with
/// defaults; the shell shows them to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no machines selected; pick at least one machine")]
    EmptyMachineSelection,

    #[error("unknown machine: {0}")]
    UnknownMachine(String),

    #[error("unknown time window '{0}' (expected one of 1h, 8h, 24h, 7d)")]
    UnknownWindow(String),
}

/// Errors from a metrics source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("telemetry source unavailable: {0}")]
    Unavailable(String),

    #[error("telemetry source timed out after {0:?}")]
    Timeout(Duration),
}

impl SourceError {
    /// Whether the next refresh cycle may succeed without the caller changing anything
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SourceError::Selection(_))
    }
}

pub type SourceResult<T> = Result<T, SourceError>;
