//! # Ledger Reconciliation
//!
//! Views derived by replaying the full set of ledger entries. Nothing here
//! mutates the ledger; every view is recomputed from a snapshot.
//!
//! ## Views
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  moneyReceipts/*  ──► ledger_entries (date, then serial)               │
//! │                           │                                             │
//! │        ┌──────────────────┼───────────────────┬────────────────────┐    │
//! │        ▼                  ▼                   ▼                    ▼    │
//! │  opening_balance    running_balance   FY / month table    payee pending │
//! │  (accepted, < date) (seeded w/ open)  (cumulative)     (credits − coll.)│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Payee pending is `creditTotal(payee) - watermark(payee)`, where the
//! watermark is the only stored input; everything else is a replay. Like
//! the balances, credit totals count accepted entries only: a pending or
//! rejected receipt is not money the payee can hand over.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::calendar::{month_key, FinancialYear};
use crate::money::Money;
use crate::serial::serial_sort_key;
use crate::types::{Booking, Payment, PaymentFor};

/// Month partition key → serial → payment.
pub type LedgerMonths = BTreeMap<String, BTreeMap<String, Payment>>;

// =============================================================================
// Ordering
// =============================================================================

/// Orders entries oldest first; undated entries go last, ties break on serial.
pub fn sort_entries(entries: &mut [Payment]) {
    entries.sort_by(|a, b| {
        let date_a = a.receipt_date.unwrap_or(NaiveDate::MAX);
        let date_b = b.receipt_date.unwrap_or(NaiveDate::MAX);
        date_a
            .cmp(&date_b)
            .then_with(|| serial_sort_key(&a.sl_no).cmp(&serial_sort_key(&b.sl_no)))
    });
}

/// Flattens month documents into one chronological list.
///
/// An entry stored without its own `slNo` takes the map key.
pub fn ledger_entries(months: &LedgerMonths) -> Vec<Payment> {
    let mut entries: Vec<Payment> = months
        .values()
        .flat_map(|month| month.iter())
        .map(|(key, payment)| {
            let mut payment = payment.clone();
            if payment.sl_no.is_empty() {
                payment.sl_no = key.clone();
            }
            payment
        })
        .collect();
    sort_entries(&mut entries);
    entries
}

// =============================================================================
// Balances
// =============================================================================

/// Balance after each entry, seeded with `opening`.
///
/// Pure: replaying the same list twice yields the same sequence.
pub fn running_balance(opening: Money, entries: &[Payment]) -> Vec<Money> {
    entries
        .iter()
        .scan(opening, |balance, entry| {
            *balance += entry.signed_amount();
            Some(*balance)
        })
        .collect()
}

/// Signed sum of accepted entries dated strictly before `as_of`.
pub fn opening_balance(entries: &[Payment], as_of: NaiveDate) -> Money {
    entries
        .iter()
        .filter(|e| e.is_accepted())
        .filter(|e| e.receipt_date.is_some_and(|d| d < as_of))
        .map(Payment::signed_amount)
        .sum()
}

/// One row of the financial-year table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FyMonthRow {
    pub fy: FinancialYear,
    /// `"2024-2025"`.
    pub fy_label: String,
    /// Month key, e.g. `"Sep2025"`.
    pub month: String,
    pub credit: Money,
    pub debit: Money,
    /// Cumulative balance through the end of this month.
    pub balance: Money,
}

/// Credits and debits per (financial year, month), with a running balance
/// in chronological order. Undated entries are not bucketed.
pub fn group_by_financial_year_and_month(entries: &[Payment]) -> Vec<FyMonthRow> {
    let mut buckets: BTreeMap<(FinancialYear, i32, u32), (Money, Money)> = BTreeMap::new();
    for entry in entries {
        let Some(date) = entry.receipt_date else {
            continue;
        };
        let key = (FinancialYear::of(date), date.year(), date.month());
        let bucket = buckets.entry(key).or_default();
        match entry.payment_for {
            PaymentFor::Credit => bucket.0 += entry.amount,
            PaymentFor::Debit => bucket.1 += entry.amount,
        }
    }

    let mut balance = Money::zero();
    buckets
        .into_iter()
        .filter_map(|((fy, year, month), (credit, debit))| {
            balance += credit - debit;
            let first = NaiveDate::from_ymd_opt(year, month, 1)?;
            Some(FyMonthRow {
                fy,
                fy_label: fy.to_string(),
                month: month_key(first),
                credit,
                debit,
                balance,
            })
        })
        .collect()
}

// =============================================================================
// Payees
// =============================================================================

/// Credits minus debits of every accepted entry whose counterparty is `payee`.
pub fn payee_credit_total(entries: &[Payment], payee: &str) -> Money {
    entries
        .iter()
        .filter(|e| e.is_accepted() && e.counterparty() == Some(payee))
        .map(Payment::signed_amount)
        .sum()
}

/// Net total per counterparty across all accepted entries.
pub fn payee_totals(entries: &[Payment]) -> BTreeMap<String, Money> {
    let mut totals: BTreeMap<String, Money> = BTreeMap::new();
    for entry in entries.iter().filter(|e| e.is_accepted()) {
        if let Some(name) = entry.counterparty() {
            *totals.entry(name.to_string()).or_default() += entry.signed_amount();
        }
    }
    totals
}

/// What a payee still holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PayeePending {
    pub payee: String,
    pub credit_total: Money,
    pub collected: Money,
    pub pending: Money,
}

impl PayeePending {
    pub fn new(payee: &str, credit_total: Money, collected: Money) -> Self {
        PayeePending {
            payee: payee.to_string(),
            credit_total,
            collected,
            pending: credit_total - collected,
        }
    }
}

/// Pending amounts for every payee seen in the ledger or the watermarks.
pub fn pending_for_payees(
    entries: &[Payment],
    watermarks: &BTreeMap<String, Money>,
) -> Vec<PayeePending> {
    let mut totals = payee_totals(entries);
    for payee in watermarks.keys() {
        totals.entry(payee.clone()).or_default();
    }
    totals
        .into_iter()
        .map(|(payee, credit_total)| {
            let collected = watermarks.get(&payee).copied().unwrap_or_default();
            PayeePending::new(&payee, credit_total, collected)
        })
        .collect()
}

// =============================================================================
// Report
// =============================================================================

/// One line of the running-balance view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BalanceRow {
    pub sl_no: String,
    #[ts(as = "Option<String>")]
    pub date: Option<NaiveDate>,
    pub payment_for: PaymentFor,
    pub amount: Money,
    pub counterparty: Option<String>,
    pub balance: Money,
}

/// The ledger screen: opening balance, running balances, FY table, payees.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReport {
    #[ts(as = "Option<String>")]
    pub period_start: Option<NaiveDate>,
    pub opening_balance: Money,
    pub rows: Vec<BalanceRow>,
    pub closing_balance: Money,
    pub fy_table: Vec<FyMonthRow>,
    pub payees: Vec<PayeePending>,
    /// Entries in the ledger, accepted or not.
    pub entry_count: usize,
    /// Entries parked under `UnknownMonth` for lack of a date.
    pub undated_entries: usize,
}

/// Builds the full report from a chronologically sorted entry list.
///
/// Balances count accepted entries only. With `period_start` set, earlier
/// entries fold into the opening balance and undated ones are left out of
/// the running rows.
pub fn build_report(
    entries: &[Payment],
    watermarks: &BTreeMap<String, Money>,
    period_start: Option<NaiveDate>,
) -> LedgerReport {
    let accepted: Vec<Payment> = entries.iter().filter(|e| e.is_accepted()).cloned().collect();
    let opening = period_start
        .map(|start| opening_balance(entries, start))
        .unwrap_or_default();

    let in_period: Vec<Payment> = accepted
        .iter()
        .filter(|e| match (period_start, e.receipt_date) {
            (None, _) => true,
            (Some(start), Some(date)) => date >= start,
            (Some(_), None) => false,
        })
        .cloned()
        .collect();
    let balances = running_balance(opening, &in_period);

    let rows: Vec<BalanceRow> = in_period
        .iter()
        .zip(balances.iter())
        .map(|(entry, balance)| BalanceRow {
            sl_no: entry.sl_no.clone(),
            date: entry.receipt_date,
            payment_for: entry.payment_for,
            amount: entry.amount,
            counterparty: entry.counterparty().map(str::to_string),
            balance: *balance,
        })
        .collect();

    LedgerReport {
        period_start,
        opening_balance: opening,
        closing_balance: balances.last().copied().unwrap_or(opening),
        rows,
        fy_table: group_by_financial_year_and_month(&accepted),
        payees: pending_for_payees(entries, watermarks),
        entry_count: entries.len(),
        undated_entries: entries.iter().filter(|e| e.receipt_date.is_none()).count(),
    }
}

// =============================================================================
// Booking Consistency
// =============================================================================

/// Comparison of a booking's embedded advances with the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub booking_id: String,
    pub booking_total: Money,
    pub ledger_total: Money,
    /// In the ledger for this booking but absent from `advancePayments`.
    pub missing_in_booking: Vec<String>,
    /// In `advancePayments` but not in the ledger.
    pub missing_in_ledger: Vec<String>,
    /// Present on both sides with different amounts.
    pub amount_mismatches: Vec<String>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.booking_total == self.ledger_total
            && self.missing_in_booking.is_empty()
            && self.missing_in_ledger.is_empty()
            && self.amount_mismatches.is_empty()
    }
}

/// Checks that the booking's credit advances match the ledger credits that
/// name this booking.
pub fn consistency_report(booking: &Booking, ledger: &[Payment]) -> ConsistencyReport {
    let ledger_side: BTreeMap<&str, Money> = ledger
        .iter()
        .filter(|e| e.is_credit() && e.booking_id.as_deref() == Some(booking.id.as_str()))
        .map(|e| (e.sl_no.as_str(), e.amount))
        .collect();
    let booking_side: BTreeMap<&str, Money> = booking
        .advance_payments
        .iter()
        .filter(|p| p.is_credit())
        .map(|p| (p.sl_no.as_str(), p.amount))
        .collect();

    let missing_in_booking = ledger_side
        .keys()
        .filter(|sl| !booking_side.contains_key(*sl))
        .map(|sl| sl.to_string())
        .collect();
    let missing_in_ledger = booking_side
        .keys()
        .filter(|sl| !ledger_side.contains_key(*sl))
        .map(|sl| sl.to_string())
        .collect();
    let amount_mismatches = booking_side
        .iter()
        .filter(|(sl, amount)| ledger_side.get(*sl).is_some_and(|l| l != *amount))
        .map(|(sl, _)| sl.to_string())
        .collect();

    ConsistencyReport {
        booking_id: booking.id.clone(),
        booking_total: booking_side.values().sum(),
        ledger_total: ledger_side.values().sum(),
        missing_in_booking,
        missing_in_ledger,
        amount_mismatches,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Approval, PaymentMode};

    fn entry(sl: &str, date: (i32, u32, u32), for_: PaymentFor, rupees: i64, who: &str) -> Payment {
        Payment {
            sl_no: sl.to_string(),
            amount: Money::from_rupees(rupees),
            mode: PaymentMode::Cash,
            payment_for: for_,
            receipt_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            raw_receipt_date: None,
            receiver: who.to_string(),
            cash_to: None,
            description: String::new(),
            approval: Approval::Accepted,
            booking_id: None,
            source_doc: None,
            sender: None,
            party_name: None,
            my_name: None,
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Vec<Payment> {
        vec![
            entry("C1", (2025, 3, 30), PaymentFor::Credit, 10_000, "Ravi"),
            entry("2", (2025, 3, 31), PaymentFor::Debit, 2_000, "Ravi"),
            entry("C3", (2025, 4, 1), PaymentFor::Credit, 5_000, "Sunil"),
            entry("4", (2025, 4, 15), PaymentFor::Credit, 1_000, "Ravi"),
        ]
    }

    #[test]
    fn test_ledger_entries_sorted_by_date_then_serial() {
        let mut months = LedgerMonths::new();
        months.entry("Apr2025".to_string()).or_default().insert(
            "C10".to_string(),
            entry("", (2025, 4, 1), PaymentFor::Credit, 1, "A"),
        );
        months.entry("Apr2025".to_string()).or_default().insert(
            "C9".to_string(),
            entry("C9", (2025, 4, 1), PaymentFor::Credit, 1, "A"),
        );
        months.entry("Mar2025".to_string()).or_default().insert(
            "7".to_string(),
            entry("7", (2025, 3, 2), PaymentFor::Credit, 1, "A"),
        );

        let serials: Vec<String> = ledger_entries(&months).into_iter().map(|p| p.sl_no).collect();
        assert_eq!(serials, vec!["7", "C9", "C10"]);
    }

    #[test]
    fn test_running_balance_is_idempotent() {
        let entries = sample();
        let first = running_balance(Money::from_rupees(500), &entries);
        let second = running_balance(Money::from_rupees(500), &entries);
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                Money::from_rupees(10_500),
                Money::from_rupees(8_500),
                Money::from_rupees(13_500),
                Money::from_rupees(14_500),
            ]
        );
    }

    #[test]
    fn test_opening_balance_counts_accepted_before_date() {
        let mut entries = sample();
        entries[0].approval = Approval::Pending;
        // Only "2" (debit 2,000) is accepted and before April 1
        assert_eq!(opening_balance(&entries, ymd(2025, 4, 1)), Money::from_rupees(-2_000));
        assert_eq!(opening_balance(&entries, ymd(2025, 3, 31)), Money::zero());
    }

    #[test]
    fn test_fy_grouping_across_boundary() {
        let rows = group_by_financial_year_and_month(&sample());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fy_label, "2024-2025");
        assert_eq!(rows[0].month, "Mar2025");
        assert_eq!(rows[0].credit, Money::from_rupees(10_000));
        assert_eq!(rows[0].debit, Money::from_rupees(2_000));
        assert_eq!(rows[0].balance, Money::from_rupees(8_000));
        assert_eq!(rows[1].fy_label, "2025-2026");
        assert_eq!(rows[1].balance, Money::from_rupees(14_000));
    }

    #[test]
    fn test_payee_pending() {
        let entries = sample();
        assert_eq!(payee_credit_total(&entries, "Ravi"), Money::from_rupees(9_000));

        let mut watermarks = BTreeMap::new();
        watermarks.insert("Ravi".to_string(), Money::from_rupees(4_000));
        watermarks.insert("Locker".to_string(), Money::zero());
        let pending = pending_for_payees(&entries, &watermarks);

        let ravi = pending.iter().find(|p| p.payee == "Ravi").unwrap();
        assert_eq!(ravi.pending, Money::from_rupees(5_000));
        assert!(pending.iter().any(|p| p.payee == "Locker"));
        assert!(pending.iter().any(|p| p.payee == "Sunil"));
    }

    #[test]
    fn test_payee_pending_skips_unaccepted_entries() {
        let mut entries = sample();
        entries.push(entry("C5", (2025, 4, 20), PaymentFor::Credit, 3_000, "Ravi"));
        entries.push(entry("C6", (2025, 4, 21), PaymentFor::Credit, 7_000, "Ravi"));
        entries[4].approval = Approval::Pending;
        entries[5].approval = Approval::Rejected;

        assert_eq!(payee_credit_total(&entries, "Ravi"), Money::from_rupees(9_000));
        assert_eq!(payee_totals(&entries)["Ravi"], Money::from_rupees(9_000));
    }

    #[test]
    fn test_loosely_typed_month_document_keeps_every_entry() {
        let months: LedgerMonths = serde_json::from_value(serde_json::json!({
            "Sep2025": {
                "C1": { "amount": 1000, "paymentFor": "Credit", "mode": "Cash",
                        "receiptDate": "2025-09-01", "receiver": "Ravi" },
                "R1": { "amount": 500, "paymentFor": "Refund", "mode": "Cash",
                        "receiptDate": "2025-09-02", "receiver": "Ravi" },
                "7": { "amount": 200, "paymentFor": "debit", "mode": "HDFC",
                       "receiptDate": "2025-09-03", "receiver": "Office" }
            }
        }))
        .unwrap();

        let entries = ledger_entries(&months);
        let serials: Vec<&str> = entries.iter().map(|e| e.sl_no.as_str()).collect();
        assert_eq!(serials, vec!["C1", "R1", "7"]);

        let report = build_report(&entries, &BTreeMap::new(), None);
        assert_eq!(report.closing_balance, Money::from_rupees(300));
        assert_eq!(payee_credit_total(&entries, "Ravi"), Money::from_rupees(500));
    }

    #[test]
    fn test_build_report_with_period() {
        let report = build_report(&sample(), &BTreeMap::new(), Some(ymd(2025, 4, 1)));
        assert_eq!(report.opening_balance, Money::from_rupees(8_000));
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.closing_balance, Money::from_rupees(14_000));
        assert_eq!(report.entry_count, 4);
        assert_eq!(report.undated_entries, 0);
    }

    #[test]
    fn test_consistency_report() {
        let mut booking = Booking {
            id: "b-1".to_string(),
            ..Default::default()
        };
        let mut paid = entry("C1", (2025, 9, 1), PaymentFor::Credit, 5_000, "Ravi");
        paid.booking_id = Some("b-1".to_string());
        let mut second = entry("C2", (2025, 9, 2), PaymentFor::Credit, 3_000, "Ravi");
        second.booking_id = Some("b-1".to_string());

        booking.advance_payments.push(paid.clone());
        let ledger = vec![paid, second.clone()];

        let report = consistency_report(&booking, &ledger);
        assert!(!report.is_consistent());
        assert_eq!(report.missing_in_booking, vec!["C2".to_string()]);

        booking.advance_payments.push(second);
        let report = consistency_report(&booking, &ledger);
        assert!(report.is_consistent());
        assert_eq!(report.booking_total, Money::from_rupees(8_000));
    }
}
