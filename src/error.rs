//! Error types for the deposit allocator.

use crate::decimal::Decimal4;
use thiserror::Error;

/// Result type alias for allocator operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while computing or applying a deposit.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to read or write a backing file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Deposit amount is zero or negative
    #[error("Amount must be greater than 0, got {0}")]
    InvalidAmount(Decimal4),

    /// Deposit amount above `Decimal4::MAX_WHOLE_UNITS`
    #[error("Amount {0} exceeds the supported maximum of {max}", max = Decimal4::max_value())]
    AmountOutOfRange(Decimal4),

    /// Command-line value that does not parse as a decimal amount
    #[error("Invalid {field}: {value:?} is not a decimal amount")]
    InvalidNumber { field: String, value: String },

    /// Proportional distribution requested but no usable main account exists
    #[error("No main account available to receive the deposit")]
    NoMainAccount,

    /// Referenced account does not exist
    #[error("Account {0} not found")]
    AccountNotFound(String),

    /// Referenced account exists but cannot receive funds
    #[error("Account {0} is frozen and cannot receive a deposit")]
    AccountNotEligible(String),

    /// Account data violates a boundary rule (negative fee, second main account, ...)
    #[error("Invalid account {account}: {message}")]
    InvalidAccount { account: String, message: String },

    /// Same account number listed twice
    #[error("Duplicate account number {account} at row {row}")]
    DuplicateAccount { account: String, row: usize },

    /// Malformed row in an accounts or ledger file
    #[error("Invalid record at row {row}: {message}")]
    InvalidRecord { row: usize, message: String },

    /// Backend refused a write
    #[error("Storage error: {0}")]
    Storage(String),

    /// Writes for a deposit or adjustment could not be committed
    #[error("Persistence failed after {attempts} attempt(s), nothing was written: {source}")]
    PersistenceFailure {
        attempts: u32,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Returns `true` for storage-level failures where rolling back and
    /// running the same unit of work again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Io(_) | EngineError::Csv(_) | EngineError::Storage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_are_retryable() {
        assert!(EngineError::Storage("disk full".into()).is_retryable());
        assert!(EngineError::Io(std::io::Error::other("boom")).is_retryable());
        assert!(!EngineError::AccountNotFound("A-1".into()).is_retryable());
        assert!(!EngineError::InvalidAmount(Decimal4::ZERO).is_retryable());
    }

    #[test]
    fn test_persistence_failure_message_names_attempts() {
        let err = EngineError::PersistenceFailure {
            attempts: 3,
            source: Box::new(EngineError::Storage("locked".into())),
        };
        let message = err.to_string();
        assert!(message.contains("3 attempt(s)"));
        assert!(message.contains("locked"));
    }

    #[test]
    fn test_range_and_number_messages() {
        let err = EngineError::AmountOutOfRange(Decimal4::from(2 * Decimal4::MAX_WHOLE_UNITS));
        assert!(err.to_string().contains("exceeds the supported maximum"));
        assert!(!err.is_retryable());

        let err = EngineError::InvalidNumber {
            field: "amount".into(),
            value: "abc".into(),
        };
        assert_eq!(err.to_string(), "Invalid amount: \"abc\" is not a decimal amount");
    }
}
