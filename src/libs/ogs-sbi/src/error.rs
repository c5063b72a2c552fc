//! SBI Error Types
//!
//! Error types for the SBI library

use thiserror::Error;

/// SBI Error type
#[derive(Error, Debug)]
pub enum SbiError {
    /// Message header is incomplete
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Transport refused or failed to queue the request
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for SBI operations
pub type SbiResult<T> = Result<T, SbiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SbiError::InvalidMessage("No method".to_string());
        assert_eq!(err.to_string(), "Invalid message: No method");
    }
}
