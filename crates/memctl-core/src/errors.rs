//! Error taxonomy shared across the workspace.
//!
//! Policy rejection is NOT an error — it is data on the success path
//! (`PolicyVerdict`). These variants cover genuine failures only.

/// Result alias used throughout the memctl crates.
pub type MemctlResult<T> = Result<T, MemctlError>;

/// Errors that can occur in the memctl core.
#[derive(Debug, thiserror::Error)]
pub enum MemctlError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("guard violation: {0}")]
    Guard(String),

    #[error("rate limit exceeded: {message}")]
    RateLimited { retry_after_ms: u64, message: String },

    #[error("LLM error: {0}")]
    Oracle(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl MemctlError {
    /// Audit outcome label for this error kind.
    pub fn outcome(&self) -> &'static str {
        match self {
            MemctlError::Guard(_) | MemctlError::Validation(_) => "rejected",
            MemctlError::RateLimited { .. } => "rate_limited",
            _ => "error",
        }
    }
}
