//! BSF Error Types

use ogs_sbi::SbiError;
use thiserror::Error;

/// BSF Error type
#[derive(Error, Debug)]
pub enum BsfError {
    /// Caller violated an operation precondition; nothing was mutated
    #[error("Precondition violation: {0}")]
    PreconditionViolation(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("NF instance not found: {0}")]
    NfInstanceNotFound(String),

    /// A lookup key is already indexed by another session
    #[error("Key [{key}] already bound to session [{binding_id}]")]
    DuplicateKey { key: String, binding_id: String },

    #[error("Maximum number of sessions [{0}] reached")]
    PoolExhausted(usize),

    /// The instance was removed but its finalizer reported a failure
    #[error("[{id}] NF finalization failed: {reason}")]
    FinalizeFailed { id: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Sbi(#[from] SbiError),
}

/// Result type for BSF operations
pub type BsfResult<T> = Result<T, BsfError>;
