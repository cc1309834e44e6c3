//! # Amounts in Words
//!
//! Renders whole-rupee amounts in the Indian numbering system for printed
//! receipts and estimates: crore, lakh, thousand, hundred.
//!
//! ```text
//! 1,23,45,678
//! │ │  │  └┴┴── "Six Hundred and Seventy Eight"
//! │ │  └─────── "Forty Five Thousand"
//! │ └────────── "Twenty Three Lakh"
//! └──────────── "One Crore"
//! ```
//!
//! The converter stops at 99,999,999 (just under ten crore); larger
//! values are reported as an overflow rather than rendered wrongly.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

/// Largest amount the converter accepts.
pub const MAX_WORDS_AMOUNT: u64 = 99_999_999;

const ONES: [&str; 20] = [
    "", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten", "Eleven",
    "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen", "Eighteen", "Nineteen",
];

const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

/// Converts a whole number to Indian words, suffixed with "only".
///
/// ```rust
/// use banquet_core::words::number_to_indian_words;
///
/// assert_eq!(
///     number_to_indian_words(135).unwrap(),
///     "One Hundred and Thirty Five only"
/// );
/// assert_eq!(number_to_indian_words(0).unwrap(), "Zero only");
/// ```
pub fn number_to_indian_words(value: u64) -> CoreResult<String> {
    if value == 0 {
        return Ok("Zero only".to_string());
    }
    Ok(format!("{} only", spell(value)?))
}

/// Spells a Money value for a receipt: `Rupees ... and ... Paise only`.
///
/// Negative amounts are spelled by magnitude; receipts print the sign
/// separately.
pub fn money_in_words(amount: Money) -> CoreResult<String> {
    let magnitude = amount.abs();
    let rupees = magnitude.rupees() as u64;
    let paise = magnitude.paise_part() as u64;

    let rupee_words = if rupees == 0 {
        "Zero".to_string()
    } else {
        spell(rupees)?
    };

    if paise == 0 {
        Ok(format!("Rupees {rupee_words} only"))
    } else {
        Ok(format!("Rupees {rupee_words} and {} Paise only", two_digits(paise)))
    }
}

fn spell(value: u64) -> CoreResult<String> {
    if value > MAX_WORDS_AMOUNT {
        return Err(CoreError::WordsOverflow {
            value,
            max: MAX_WORDS_AMOUNT,
        });
    }

    let crore = value / 1_00_00_000;
    let lakh = (value / 1_00_000) % 100;
    let thousand = (value / 1_000) % 100;
    let hundred = (value / 100) % 10;
    let rest = value % 100;

    let mut parts: Vec<String> = Vec::new();
    if crore > 0 {
        parts.push(format!("{} Crore", two_digits(crore)));
    }
    if lakh > 0 {
        parts.push(format!("{} Lakh", two_digits(lakh)));
    }
    if thousand > 0 {
        parts.push(format!("{} Thousand", two_digits(thousand)));
    }
    if hundred > 0 {
        parts.push(format!("{} Hundred", ONES[hundred as usize]));
    }
    if rest > 0 {
        if hundred > 0 {
            parts.push(format!("and {}", two_digits(rest)));
        } else {
            parts.push(two_digits(rest));
        }
    }
    Ok(parts.join(" "))
}

fn two_digits(value: u64) -> String {
    let value = value as usize;
    if value < 20 {
        ONES[value].to_string()
    } else if value % 10 == 0 {
        TENS[value / 10].to_string()
    } else {
        format!("{} {}", TENS[value / 10], ONES[value % 10])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_numbers() {
        assert_eq!(number_to_indian_words(7).unwrap(), "Seven only");
        assert_eq!(number_to_indian_words(19).unwrap(), "Nineteen only");
        assert_eq!(number_to_indian_words(40).unwrap(), "Forty only");
        assert_eq!(number_to_indian_words(99).unwrap(), "Ninety Nine only");
    }

    #[test]
    fn test_and_after_hundreds() {
        assert_eq!(
            number_to_indian_words(135).unwrap(),
            "One Hundred and Thirty Five only"
        );
        assert_eq!(number_to_indian_words(500).unwrap(), "Five Hundred only");
        assert_eq!(
            number_to_indian_words(1_005).unwrap(),
            "One Thousand Five only"
        );
    }

    #[test]
    fn test_lakh_and_crore() {
        assert_eq!(number_to_indian_words(1_00_000).unwrap(), "One Lakh only");
        assert_eq!(
            number_to_indian_words(12_34_567).unwrap(),
            "Twelve Lakh Thirty Four Thousand Five Hundred and Sixty Seven only"
        );
        assert_eq!(
            number_to_indian_words(MAX_WORDS_AMOUNT).unwrap(),
            "Nine Crore Ninety Nine Lakh Ninety Nine Thousand Nine Hundred and Ninety Nine only"
        );
    }

    #[test]
    fn test_zero() {
        assert_eq!(number_to_indian_words(0).unwrap(), "Zero only");
    }

    #[test]
    fn test_overflow_is_reported() {
        let err = number_to_indian_words(MAX_WORDS_AMOUNT + 1).unwrap_err();
        assert!(matches!(
            err,
            CoreError::WordsOverflow {
                value: 100_000_000,
                ..
            }
        ));
    }

    #[test]
    fn test_money_in_words() {
        assert_eq!(
            money_in_words(Money::from_paise(125050)).unwrap(),
            "Rupees One Thousand Two Hundred and Fifty and Fifty Paise only"
        );
        assert_eq!(
            money_in_words(Money::from_rupees(45_000)).unwrap(),
            "Rupees Forty Five Thousand only"
        );
        assert_eq!(
            money_in_words(Money::from_paise(5)).unwrap(),
            "Rupees Zero and Five Paise only"
        );
    }
}
