//! # Validation Module
//!
//! Input validation for payment, booking and collect submissions.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: SPA form                                                      │
//! │  ├── Required fields, inline messages                                  │
//! │  └── Keeps the form populated on failure                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (before any write)                               │
//! │  ├── Amounts positive, names present and bounded                       │
//! │  └── Collect within pending                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Write transaction                                            │
//! │  └── Collect re-checks pending against the committed ledger            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use banquet_core::validation::{validate_payee_name, validate_payment_amount};
//! use banquet_core::Money;
//!
//! assert!(validate_payment_amount(Money::from_rupees(500)).is_ok());
//! assert!(validate_payee_name("Money").is_err());
//! ```

use crate::calendar::{parse_month_key, UNKNOWN_MONTH};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{PaymentMode, MODE_TOTALS_DOC, RESERVED_ACCOUNTANT_DOCS};
use crate::{MAX_DESCRIPTION_LEN, MAX_NAME_LEN, MAX_PLATES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Trims and checks a required name-like field.
pub fn validate_name(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(value.to_string())
}

/// Validates the staff name on a receipt.
pub fn validate_receiver(receiver: &str) -> ValidationResult<String> {
    validate_name("receiver", receiver)
}

/// Validates a free-text description. Empty is allowed.
pub fn validate_description(description: &str) -> ValidationResult<String> {
    let description = description.trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: MAX_DESCRIPTION_LEN,
        });
    }
    Ok(description.to_string())
}

/// Validates a payee name used as a document id.
///
/// ## Rules
/// - Required, at most 100 characters
/// - No `/` (it would split the document path)
/// - Not one of the names the document layout reserves
pub fn validate_payee_name(payee: &str) -> ValidationResult<String> {
    let payee = validate_name("payee", payee)?;

    if payee.contains('/') {
        return Err(ValidationError::InvalidFormat {
            field: "payee".to_string(),
            reason: "must not contain '/'".to_string(),
        });
    }

    if payee == MODE_TOTALS_DOC || RESERVED_ACCOUNTANT_DOCS.contains(&payee.as_str()) {
        return Err(ValidationError::Reserved {
            field: "payee".to_string(),
            value: payee,
        });
    }

    Ok(payee)
}

/// Validates a booking id used as a document key.
pub fn validate_booking_id(id: &str) -> ValidationResult<String> {
    let id = validate_name("bookingId", id)?;
    if id.contains('/') {
        return Err(ValidationError::InvalidFormat {
            field: "bookingId".to_string(),
            reason: "must not contain '/'".to_string(),
        });
    }
    Ok(id)
}

/// Validates a month partition key (`"Sep2025"` or `"UnknownMonth"`).
pub fn validate_month_key(key: &str) -> ValidationResult<()> {
    if key == UNKNOWN_MONTH || parse_month_key(key).is_some() {
        return Ok(());
    }
    Err(ValidationError::InvalidFormat {
        field: "month".to_string(),
        reason: format!("expected a key like Sep2025, got '{key}'"),
    })
}

/// A mode must be named; legacy blank modes cannot be submitted.
pub fn validate_mode(mode: &PaymentMode) -> ValidationResult<()> {
    if matches!(mode, PaymentMode::Unspecified) {
        return Err(ValidationError::Required {
            field: "mode".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a payment amount.
///
/// ## Rules
/// - Must be positive (> 0); direction is carried by `paymentFor`, never the sign
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    Ok(())
}

/// Validates plate counts on a booking.
pub fn validate_plate_counts(no_of_plates: i64, extra_plates: i64) -> ValidationResult<()> {
    for (field, value) in [("noOfPlates", no_of_plates), ("extraPlates", extra_plates)] {
        if !(0..=MAX_PLATES).contains(&value) {
            return Err(ValidationError::OutOfRange {
                field: field.to_string(),
                min: 0,
                max: MAX_PLATES,
            });
        }
    }
    Ok(())
}

/// Validates a collect request against what the payee still holds.
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Receiver Collections: Collect                                          │
/// │                                                                         │
/// │  amount <= 0?          → "amount must be positive"                     │
/// │  amount > pending?     → "Cannot collect ... only ... pending"         │
/// │  otherwise             → watermark += amount, mode bucket += amount    │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_collect(payee: &str, amount: Money, pending: Money) -> CoreResult<()> {
    validate_payment_amount(amount)?;
    if amount > pending {
        return Err(CoreError::CollectExceedsPending {
            payee: payee.to_string(),
            requested: amount,
            pending,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_receiver("  Ravi ").unwrap(), "Ravi");
        assert!(validate_receiver("").is_err());
        assert!(validate_receiver("   ").is_err());
        assert!(validate_receiver(&"A".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_description() {
        assert_eq!(validate_description("").unwrap(), "");
        assert!(validate_description(&"x".repeat(MAX_DESCRIPTION_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_payee_name() {
        assert!(validate_payee_name("Abhishek-Bank").is_ok());
        assert!(validate_payee_name("Main-Locker").is_ok());
        assert!(matches!(
            validate_payee_name("Money"),
            Err(ValidationError::Reserved { .. })
        ));
        assert!(validate_payee_name("BankNames").is_err());
        assert!(validate_payee_name("a/b").is_err());
        assert!(validate_payee_name("").is_err());
    }

    #[test]
    fn test_validate_month_key() {
        assert!(validate_month_key("Sep2025").is_ok());
        assert!(validate_month_key(UNKNOWN_MONTH).is_ok());
        assert!(validate_month_key("2025-09").is_err());
    }

    #[test]
    fn test_validate_payment_amount() {
        assert!(validate_payment_amount(Money::from_paise(1)).is_ok());
        assert!(validate_payment_amount(Money::zero()).is_err());
        assert!(validate_payment_amount(Money::from_rupees(-5)).is_err());
    }

    #[test]
    fn test_validate_mode() {
        assert!(validate_mode(&PaymentMode::Cash).is_ok());
        assert!(validate_mode(&PaymentMode::Unspecified).is_err());
    }

    #[test]
    fn test_validate_plate_counts() {
        assert!(validate_plate_counts(100, 10).is_ok());
        assert!(validate_plate_counts(-1, 0).is_err());
        assert!(validate_plate_counts(0, MAX_PLATES + 1).is_err());
    }

    #[test]
    fn test_validate_collect_bounds() {
        let pending = Money::from_rupees(45_000);
        assert!(validate_collect("Ravi", Money::from_rupees(45_000), pending).is_ok());
        assert!(matches!(
            validate_collect("Ravi", Money::zero(), pending),
            Err(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));
        assert!(matches!(
            validate_collect("Ravi", Money::from_rupees(45_001), pending),
            Err(CoreError::CollectExceedsPending { .. })
        ));
    }
}
