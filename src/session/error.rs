use crate::session::model::{ExerciseSet, Session, SessionId, SessionStatus};

/// Errors surfaced by session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Unknown id, or an id owned by someone else
    #[error("Session not found")]
    NotFound,

    /// Path id and body id disagree on a full update
    #[error("Id mismatch: path id {path} does not match body id {body}")]
    IdMismatch { path: SessionId, body: SessionId },

    #[error("Status must not be empty")]
    EmptyStatus,

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// Recognized status that can't be reached from the current one
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("Invalid set: {0}")]
    InvalidSet(String),

    /// Stale write; carries the stored record for reconciliation
    #[error("Version conflict: submitted version {submitted} is stale")]
    VersionConflict {
        submitted: u64,
        current: Box<Session>,
    },

    /// Stale write against an exercise set
    #[error("Set version conflict: submitted version {submitted} is stale")]
    SetVersionConflict {
        submitted: u64,
        current: Box<ExerciseSet>,
    },

    /// Retention window that can't be subtracted from the sweep time
    #[error("Invalid retention window: {0} days")]
    InvalidRetention(i64),

    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Whether the caller can correct the request and try again
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            SessionError::Storage(_) | SessionError::InvalidRetention(_)
        )
    }

    /// Stored record attached to a session version conflict
    pub fn current_record(&self) -> Option<&Session> {
        match self {
            SessionError::VersionConflict { current, .. } => Some(current),
            _ => None,
        }
    }
}

/// Failures of the underlying row store
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt store: {0}")]
    Corrupt(String),

    /// The detached commit task was cancelled or panicked
    #[error("Commit task failed: {0}")]
    Commit(#[from] tokio::task::JoinError),
}
