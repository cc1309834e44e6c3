//! # Serial Counters
//!
//! Named counters in `settings/slCounter` and the receipt numbers they print.
//!
//! ```text
//! ┌──────────────────────┬──────────────────────┬────────┬──────────────┐
//! │ Counter              │ Document field       │ Prefix │ Example      │
//! ├──────────────────────┼──────────────────────┼────────┼──────────────┤
//! │ MoneyReceipt         │ moneyReceipt         │        │ 412          │
//! │ CashMoneyReceipt     │ cashMoneyReceipt     │ C      │ C87          │
//! │ RefundMoneyReceipt   │ refundMoneyReceipt   │ R      │ R5           │
//! │ GlobalEvents         │ globalEvents         │        │ 1033         │
//! └──────────────────────┴──────────────────────┴────────┴──────────────┘
//! ```
//!
//! Allocation itself (read, increment, write in one transaction) lives in
//! the storage layer; this module only names counters and formats numbers.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::types::{PaymentFor, PaymentMode};

/// A named counter in the shared counter document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum SerialCounter {
    MoneyReceipt,
    CashMoneyReceipt,
    RefundMoneyReceipt,
    GlobalEvents,
}

impl SerialCounter {
    pub const ALL: [SerialCounter; 4] = [
        SerialCounter::MoneyReceipt,
        SerialCounter::CashMoneyReceipt,
        SerialCounter::RefundMoneyReceipt,
        SerialCounter::GlobalEvents,
    ];

    /// Field name inside `settings/slCounter`.
    pub fn field_name(&self) -> &'static str {
        match self {
            SerialCounter::MoneyReceipt => "moneyReceipt",
            SerialCounter::CashMoneyReceipt => "cashMoneyReceipt",
            SerialCounter::RefundMoneyReceipt => "refundMoneyReceipt",
            SerialCounter::GlobalEvents => "globalEvents",
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            SerialCounter::CashMoneyReceipt => "C",
            SerialCounter::RefundMoneyReceipt => "R",
            SerialCounter::MoneyReceipt | SerialCounter::GlobalEvents => "",
        }
    }

    /// Printable serial for an allocated number.
    pub fn format(&self, number: u64) -> String {
        format!("{}{}", self.prefix(), number)
    }

    /// Counter a payment draws its serial from.
    ///
    /// Refunds use the refund counter, cash credits the cash counter and
    /// everything else (bank, card, cheque, cash debits) the plain one.
    pub fn for_payment(refund: bool, payment_for: PaymentFor, mode: &PaymentMode) -> Self {
        if refund {
            SerialCounter::RefundMoneyReceipt
        } else if payment_for == PaymentFor::Credit && mode.is_cash() {
            SerialCounter::CashMoneyReceipt
        } else {
            SerialCounter::MoneyReceipt
        }
    }
}

impl FromStr for SerialCounter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SerialCounter::ALL
            .into_iter()
            .find(|c| c.field_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "counter".to_string(),
                reason: format!("unknown counter '{s}'"),
            })
    }
}

/// Sort key for serials: prefix first, then numeric value.
///
/// `"C9" < "C10"`, and serials without a numeric tail sort after numbered
/// ones with the same prefix.
pub fn serial_sort_key(serial: &str) -> (String, u64, String) {
    let prefix: String = serial.chars().take_while(|c| !c.is_ascii_digit()).collect();
    let digits: String = serial[prefix.len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let number = digits.parse::<u64>().unwrap_or(u64::MAX);
    (prefix, number, serial.to_string())
}

/// Counter a printed receipt number came from, if it looks like one.
///
/// Bare numbers are attributed to `MoneyReceipt`; keys that are not
/// `prefix + digits` (content keys of imported rows) yield `None`.
pub fn parse_serial(sl_no: &str) -> Option<(SerialCounter, u64)> {
    let (counter, digits) = if let Some(rest) = sl_no.strip_prefix('C') {
        (SerialCounter::CashMoneyReceipt, rest)
    } else if let Some(rest) = sl_no.strip_prefix('R') {
        (SerialCounter::RefundMoneyReceipt, rest)
    } else {
        (SerialCounter::MoneyReceipt, sl_no)
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|n| (counter, n))
}

/// Highest number `counter` has printed among `serials` (0 when none).
pub fn highest_serial<'a>(serials: impl IntoIterator<Item = &'a str>, counter: SerialCounter) -> u64 {
    serials
        .into_iter()
        .filter_map(parse_serial)
        .filter(|(c, _)| *c == counter)
        .map(|(_, n)| n)
        .max()
        .unwrap_or(0)
}

/// Namespace for content-derived keys of imported rows without a serial.
const IMPORT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a8e_9b4d_4c1a_8e3f_5d7b_2c9a_1e40);

/// Stable key for an imported row that carries no serial.
///
/// The same row content always yields the same key, so importing a file
/// twice lands on the same ledger entries.
pub fn import_key(content: &str) -> String {
    Uuid::new_v5(&IMPORT_NAMESPACE, content.as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_with_prefix() {
        assert_eq!(SerialCounter::CashMoneyReceipt.format(87), "C87");
        assert_eq!(SerialCounter::RefundMoneyReceipt.format(5), "R5");
        assert_eq!(SerialCounter::MoneyReceipt.format(412), "412");
        assert_eq!(SerialCounter::GlobalEvents.format(1033), "1033");
    }

    #[test]
    fn test_counter_selection() {
        let cash = PaymentMode::Cash;
        let bank = PaymentMode::Bank("HDFC".to_string());

        assert_eq!(
            SerialCounter::for_payment(false, PaymentFor::Credit, &cash),
            SerialCounter::CashMoneyReceipt
        );
        assert_eq!(
            SerialCounter::for_payment(false, PaymentFor::Credit, &bank),
            SerialCounter::MoneyReceipt
        );
        assert_eq!(
            SerialCounter::for_payment(false, PaymentFor::Debit, &cash),
            SerialCounter::MoneyReceipt
        );
        assert_eq!(
            SerialCounter::for_payment(true, PaymentFor::Debit, &cash),
            SerialCounter::RefundMoneyReceipt
        );
    }

    #[test]
    fn test_parse_counter_name() {
        assert_eq!(
            "cashMoneyReceipt".parse::<SerialCounter>().unwrap(),
            SerialCounter::CashMoneyReceipt
        );
        assert!("receipt".parse::<SerialCounter>().is_err());
    }

    #[test]
    fn test_import_key_is_stable() {
        let a = import_key("2025-09-14|5000|Cash|Ravi");
        assert_eq!(a, import_key("2025-09-14|5000|Cash|Ravi"));
        assert_ne!(a, import_key("2025-09-14|5000|Cash|Sunil"));
    }

    #[test]
    fn test_parse_serial() {
        assert_eq!(parse_serial("C87"), Some((SerialCounter::CashMoneyReceipt, 87)));
        assert_eq!(parse_serial("R5"), Some((SerialCounter::RefundMoneyReceipt, 5)));
        assert_eq!(parse_serial("412"), Some((SerialCounter::MoneyReceipt, 412)));
        assert_eq!(parse_serial("6f1c2a8e-9b4d-5c1a-8e3f-5d7b2c9a1e40"), None);
        assert_eq!(parse_serial("C"), None);
    }

    #[test]
    fn test_highest_serial_per_counter() {
        let stored = ["C3", "C12", "7", "R2", "C9", "legacy"];
        assert_eq!(highest_serial(stored, SerialCounter::CashMoneyReceipt), 12);
        assert_eq!(highest_serial(stored, SerialCounter::MoneyReceipt), 7);
        assert_eq!(highest_serial(stored, SerialCounter::RefundMoneyReceipt), 2);
        assert_eq!(highest_serial([], SerialCounter::CashMoneyReceipt), 0);
    }

    #[test]
    fn test_serial_sort_key_orders_numerically() {
        let mut serials = vec!["C10", "12", "C9", "3", "R1", "legacy"];
        serials.sort_by_key(|s| serial_sort_key(s));
        assert_eq!(serials, vec!["3", "12", "C9", "C10", "R1", "legacy"]);
    }
}
