use thiserror::Error;

/// Result type alias for dispatch operations
pub type Result<T, E = DispatchError> = std::result::Result<T, E>;

/// Unexpected defects inside an integration handler.
///
/// Expected failure modes (bad credentials, unreachable endpoints, remote
/// 4xx/5xx, timeouts) never surface here; handlers fold them into a failed
/// `ExecuteOutcome`. Anything that does propagate is absorbed at the
/// orchestrator boundary and recorded as a failed log entry.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("invalid integration config: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}
