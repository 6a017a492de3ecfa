use thiserror::Error;

/// Error kinds the core distinguishes. See spec §7.
#[derive(Debug, Error)]
pub enum HiveError {
    /// No API key, missing vault params — fatal at startup.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// User, conversation, skill, workflow, credential, script.
    #[error("not found: {0}")]
    NotFound(String),

    /// Credential ownership mismatch, cross-user workflow trigger.
    /// Surfaced verbatim; never leaks internals.
    #[error("{0}")]
    Unauthorized(String),

    /// Invalid cron, invalid URL, unknown tool, unknown step type, bad input mapping.
    #[error("validation error: {0}")]
    Validation(String),

    /// LLM, HTTP, DNS transport failures.
    #[error("transport error: {0}")]
    Transport(String),

    /// User-visible friendly refusal from the trigger service.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// 15s HTTP / 60s script timeouts.
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Decrypt GCM tag failure — surfaced as corrupted credential, never auto-recovered.
    #[error("corrupted credential: {0}")]
    IntegrityMismatch(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HiveError {
    /// Short error code, useful in logs and any future wire surface.
    pub fn code(&self) -> &'static str {
        match self {
            HiveError::NotConfigured(_) => "NOT_CONFIGURED",
            HiveError::NotFound(_) => "NOT_FOUND",
            HiveError::Unauthorized(_) => "UNAUTHORIZED",
            HiveError::Validation(_) => "VALIDATION",
            HiveError::Transport(_) => "TRANSPORT",
            HiveError::RateLimited(_) => "RATE_LIMITED",
            HiveError::Timeout(_) => "TIMEOUT",
            HiveError::IntegrityMismatch(_) => "INTEGRITY_MISMATCH",
            HiveError::Database(_) => "DATABASE_ERROR",
            HiveError::Serialization(_) => "SERIALIZATION_ERROR",
            HiveError::Io(_) => "IO_ERROR",
            HiveError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, HiveError>;
