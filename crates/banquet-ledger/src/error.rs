//! # Ledger Error Types
//!
//! Error types for ledger operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Ledger Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Rejected      │  │   Transient     │  │     Configuration       │ │
//! │  │  (no writes)    │  │  (try again)    │  │                         │ │
//! │  │                 │  │                 │  │  Config                 │ │
//! │  │  Validation     │  │  Busy           │  │  ConfigLoadFailed       │ │
//! │  │  CollectRejected│  │  Allocation-    │  │                         │ │
//! │  │  InvalidPayment │  │   Exhausted     │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Storage      │  │    Lookup       │  │      Transfer           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Database       │  │  PaymentNotFound│  │  Import                 │ │
//! │  │  Serialization  │  │  BookingNotFound│  │  Export                 │ │
//! │  │                 │  │  SerialConflict │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use banquet_core::{CoreError, Money, ValidationError};
use banquet_db::DbError;
use thiserror::Error;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger error type covering every failure a caller can see.
///
/// Rejections happen before any write. Mirror failures are not errors at
/// this level: they are reported in the operation outcome.
#[derive(Debug, Error)]
pub enum LedgerError {
    // =========================================================================
    // Rejections
    // =========================================================================
    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Payment does not fit the target it was submitted for.
    #[error("Invalid payment: {0}")]
    InvalidPayment(String),

    /// Collect asked for a non-positive amount or more than is pending.
    #[error("Cannot collect {requested} from {payee}: only {pending} pending")]
    CollectRejected {
        payee: String,
        requested: Money,
        pending: Money,
    },

    /// Amount cannot be spelled out.
    #[error("{0}")]
    Words(String),

    // =========================================================================
    // Transient
    // =========================================================================
    /// The write lock stayed taken past the retry budget. Nothing was written.
    #[error("Write lock still busy after {attempts} attempts, try again")]
    AllocationExhausted { attempts: u32 },

    // =========================================================================
    // Lookup
    // =========================================================================
    /// No ledger entry carries this serial.
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    /// No booking with this id in any partition.
    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    /// A freshly allocated serial is already taken in the ledger. Nothing
    /// was written.
    #[error("Serial {0} already exists in the ledger")]
    SerialConflict(String),

    // =========================================================================
    // Storage
    // =========================================================================
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    // =========================================================================
    // Configuration
    // =========================================================================
    /// Configuration value is invalid.
    #[error("Invalid ledger configuration: {0}")]
    Config(String),

    /// Config file could not be read or parsed.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Transfer
    // =========================================================================
    /// Import file could not be read.
    #[error("Import failed: {0}")]
    Import(String),

    /// Export file could not be written.
    #[error("Export failed: {0}")]
    Export(String),

    // =========================================================================
    // Internal
    // =========================================================================
    /// Background task or channel failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// From Implementations
// =============================================================================

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => LedgerError::Validation(v),
            CoreError::CollectExceedsPending {
                payee,
                requested,
                pending,
            } => LedgerError::CollectRejected {
                payee,
                requested,
                pending,
            },
            CoreError::InvalidPayment { reason } => LedgerError::InvalidPayment(reason),
            CoreError::InvalidMonthKey(key) => LedgerError::Validation(ValidationError::InvalidFormat {
                field: "month".to_string(),
                reason: format!("'{key}' is not a month key"),
            }),
            words @ CoreError::WordsOverflow { .. } => LedgerError::Words(words.to_string()),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<csv::Error> for LedgerError {
    fn from(err: csv::Error) -> Self {
        LedgerError::Import(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl LedgerError {
    /// True when the same call may succeed if repeated.
    ///
    /// ## Retryable Errors
    /// - Write lock held by another writer (`Busy`)
    /// - Pool exhausted
    /// - Allocation retries exhausted ("try again")
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Database(db) => db.is_retryable(),
            LedgerError::AllocationExhausted { .. } => true,
            _ => false,
        }
    }

    /// True when the request was refused before anything was written.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::Validation(_)
                | LedgerError::InvalidPayment(_)
                | LedgerError::CollectRejected { .. }
                | LedgerError::Words(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(self, LedgerError::Config(_) | LedgerError::ConfigLoadFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(LedgerError::AllocationExhausted { attempts: 5 }.is_retryable());
        assert!(LedgerError::Database(DbError::Busy("database is locked".into())).is_retryable());

        assert!(!LedgerError::Config("bad".into()).is_retryable());
        assert!(!LedgerError::PaymentNotFound("C12".into()).is_retryable());
        assert!(!LedgerError::Database(DbError::not_found("moneyReceipts", "Sep2025")).is_retryable());
    }

    #[test]
    fn test_collect_rejection_from_core() {
        let err: LedgerError = CoreError::CollectExceedsPending {
            payee: "Abhishek-Bank".into(),
            requested: Money::from_rupees(60_000),
            pending: Money::from_rupees(45_000),
        }
        .into();

        assert!(err.is_rejection());
        assert!(err.to_string().contains("Abhishek-Bank"));
    }

    #[test]
    fn test_validation_passthrough() {
        let err: LedgerError = CoreError::Validation(ValidationError::MustBePositive {
            field: "amount".into(),
        })
        .into();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(err.to_string(), "Validation error: amount must be positive");
    }
}
