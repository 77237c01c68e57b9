//! Error types for stockroom

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Authentication error: {0}")]
    Unauthenticated(String),

    #[error("Session {0} is no longer active")]
    SessionNotActive(String),

    #[error("Session {0} is already completed")]
    SessionAlreadyCompleted(String),

    #[error("Session {0} is still active and cannot be deleted")]
    SessionStillActive(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Stable machine-readable code for API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::InvalidInput(_) => "INVALID_INPUT",
            LedgerError::Forbidden(_) => "FORBIDDEN",
            LedgerError::Unauthenticated(_) => "UNAUTHENTICATED",
            LedgerError::SessionNotActive(_) => "SESSION_NOT_ACTIVE",
            LedgerError::SessionAlreadyCompleted(_) => "SESSION_ALREADY_COMPLETED",
            LedgerError::SessionStillActive(_) => "SESSION_STILL_ACTIVE",
            LedgerError::Json(_) | LedgerError::Csv(_) => "BAD_PAYLOAD",
            _ => "INTERNAL",
        }
    }

    /// True for the state-conflict family (session moved on under the caller)
    pub fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            LedgerError::SessionNotActive(_)
                | LedgerError::SessionAlreadyCompleted(_)
                | LedgerError::SessionStillActive(_)
        )
    }
}
