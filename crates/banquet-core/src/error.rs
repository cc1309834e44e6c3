//! # Error Types
//!
//! Domain-specific error types for banquet-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  banquet-core errors (this file)                                       │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  banquet-db errors (separate crate)                                    │
//! │  └── DbError          - Document store failures                        │
//! │                                                                         │
//! │  banquet-ledger errors                                                 │
//! │  └── LedgerError      - What the SPA/CLI sees                          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The charge aggregator never returns errors: malformed numbers are coerced
//! to zero. Errors here come from explicit submissions (payments, collects)
//! and from the word converter's range limit.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Amount is above what the Indian-words converter supports.
    #[error("Amount {value} exceeds the maximum of {max} supported in words")]
    WordsOverflow { value: u64, max: u64 },

    /// A month partition key could not be parsed.
    #[error("Invalid month key: {0}")]
    InvalidMonthKey(String),

    /// Collect request asks for more than the payee still holds.
    ///
    /// ## User Workflow
    /// ```text
    /// Collect from "Abhishek-Bank": ₹60,000
    ///      │
    ///      ▼
    /// pending = credits - already collected = ₹45,000
    ///      │
    ///      ▼
    /// CollectExceedsPending { requested: 60000, pending: 45000 }
    ///      │
    ///      ▼
    /// UI keeps the form populated and shows the pending figure
    /// ```
    #[error("Cannot collect {requested} from {payee}: only {pending} pending")]
    CollectExceedsPending {
        payee: String,
        requested: Money,
        pending: Money,
    },

    /// Payment does not fit the target it was submitted for.
    #[error("Invalid payment: {reason}")]
    InvalidPayment { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any write happens, so a rejected submission never leaves
/// partial state behind.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid month key, invalid serial).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is reserved by the document layout.
    #[error("{field} '{value}' is reserved")]
    Reserved { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::CollectExceedsPending {
            payee: "Abhishek-Bank".to_string(),
            requested: Money::from_rupees(600),
            pending: Money::from_rupees(450),
        };
        assert_eq!(
            err.to_string(),
            "Cannot collect ₹600.00 from Abhishek-Bank: only ₹450.00 pending"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "receiver".to_string(),
        };
        assert_eq!(err.to_string(), "receiver is required");

        let err = ValidationError::Reserved {
            field: "payee".to_string(),
            value: "Money".to_string(),
        };
        assert_eq!(err.to_string(), "payee 'Money' is reserved");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "amount".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
