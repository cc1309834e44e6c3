//! # Ledger Reports
//!
//! Read-only views derived by replaying the full ledger. Nothing here is
//! stored: every call reads the current month documents and recomputes.

use std::collections::BTreeMap;

use banquet_core::reconcile::{build_report, consistency_report, ledger_entries, pending_for_payees};
use banquet_core::{ConsistencyReport, LedgerReport, Money, PayeePending};
use banquet_db::Database;
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::{LedgerError, LedgerResult};

#[derive(Debug, Clone)]
pub struct LedgerReporter {
    db: Database,
}

impl LedgerReporter {
    pub fn new(db: Database) -> Self {
        LedgerReporter { db }
    }

    /// Full ledger screen. With `period_start`, earlier entries fold into the
    /// opening balance.
    pub async fn report(&self, period_start: Option<NaiveDate>) -> LedgerResult<LedgerReport> {
        let months = self.db.receipts().all_months().await?;
        let watermarks = self.db.received_money().watermarks().await?;
        let entries = ledger_entries(&months);

        let report = build_report(&entries, &watermarks, period_start);
        debug!(
            entries = report.entry_count,
            undated = report.undated_entries,
            closing = %report.closing_balance,
            "Ledger report built"
        );
        Ok(report)
    }

    /// Pending amount for every payee seen in the ledger or the watermarks.
    pub async fn pending_all(&self) -> LedgerResult<Vec<PayeePending>> {
        let months = self.db.receipts().all_months().await?;
        let watermarks = self.db.received_money().watermarks().await?;
        Ok(pending_for_payees(&ledger_entries(&months), &watermarks))
    }

    pub async fn payee_pending(&self, payee: &str) -> LedgerResult<PayeePending> {
        let pending = self.pending_all().await?;
        Ok(pending
            .into_iter()
            .find(|p| p.payee == payee)
            .unwrap_or_else(|| PayeePending::new(payee, Money::zero(), Money::zero())))
    }

    /// `receivedMoney/Money` buckets.
    pub async fn mode_totals(&self) -> LedgerResult<BTreeMap<String, Money>> {
        Ok(self.db.received_money().mode_totals().await?)
    }

    /// Compares one booking's advances with the ledger.
    pub async fn booking_consistency(&self, booking_id: &str) -> LedgerResult<ConsistencyReport> {
        let booking = self
            .db
            .bookings()
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| LedgerError::BookingNotFound(booking_id.to_string()))?;
        let months = self.db.receipts().all_months().await?;
        Ok(consistency_report(&booking, &ledger_entries(&months)))
    }

    /// Every booking whose advances disagree with the ledger.
    ///
    /// A non-empty result after the outbox has drained means a mirror was
    /// lost or a copy was edited outside the writer.
    pub async fn inconsistent_bookings(&self) -> LedgerResult<Vec<ConsistencyReport>> {
        let bookings = self.db.bookings().list_all().await?;
        let months = self.db.receipts().all_months().await?;
        let entries = ledger_entries(&months);

        let reports: Vec<ConsistencyReport> = bookings
            .iter()
            .map(|booking| consistency_report(booking, &entries))
            .filter(|report| !report.is_consistent())
            .collect();

        for report in &reports {
            warn!(
                booking_id = %report.booking_id,
                booking_total = %report.booking_total,
                ledger_total = %report.ledger_total,
                "Booking advances disagree with ledger"
            );
        }
        Ok(reports)
    }
}
