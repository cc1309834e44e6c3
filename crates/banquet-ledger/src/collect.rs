//! # Receiver Collections
//!
//! Moving money a payee holds into a mode bucket ("Collect").
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  collect("Abhishek", ₹4,000, "Cash")                                   │
//! │                                                                         │
//! │  ┌─────────────────── one write transaction ───────────────────────┐   │
//! │  │  credits  = replay every ledger entry for Abhishek             │   │
//! │  │  collected = receivedMoney/Abhishek.totalReceived              │   │
//! │  │  pending  = credits - collected                                │   │
//! │  │  0 < amount <= pending ?  else reject, nothing written         │   │
//! │  │  receivedMoney/Abhishek.totalReceived += amount                │   │
//! │  │  receivedMoney/Money.Cash             += amount                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Two collects against the same payee queue on the write lock, so the  │
//! │  second one sees the first one's watermark.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use banquet_core::reconcile::{ledger_entries, payee_credit_total};
use banquet_core::validation::{validate_collect, validate_name, validate_payee_name, validate_payment_amount};
use banquet_core::{Money, PayeePending};
use banquet_db::Database;
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::config::AllocationSettings;
use crate::error::LedgerResult;
use crate::retry::with_write_retry;

/// Result of a successful collect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectOutcome {
    pub payee: String,
    pub amount: Money,
    pub target_mode: String,
    pub pending_before: Money,
    pub pending_after: Money,
    /// Payee watermark after the increment.
    pub total_received: Money,
    /// Mode bucket after the increment.
    pub mode_total: Money,
}

#[derive(Debug, Clone)]
pub struct Collections {
    db: Database,
    retry: AllocationSettings,
}

impl Collections {
    pub fn new(db: Database, retry: AllocationSettings) -> Self {
        Collections { db, retry }
    }

    /// Collects `amount` from `payee` into the `target_mode` bucket.
    ///
    /// Rejected with no state change when the amount is not positive or
    /// exceeds what the payee still holds.
    pub async fn collect(&self, payee: &str, amount: Money, target_mode: &str) -> LedgerResult<CollectOutcome> {
        let payee = validate_payee_name(payee)?;
        let target_mode = validate_name("mode", target_mode)?;
        validate_payment_amount(amount)?;

        let outcome = with_write_retry(&self.retry, "collect", || self.try_collect(&payee, amount, &target_mode)).await?;

        info!(
            payee = %outcome.payee,
            amount = %outcome.amount,
            mode = %outcome.target_mode,
            pending = %outcome.pending_after,
            "Collected from payee"
        );
        Ok(outcome)
    }

    async fn try_collect(&self, payee: &str, amount: Money, target_mode: &str) -> LedgerResult<CollectOutcome> {
        let mut tx = self.db.begin_write().await?;
        let received = self.db.received_money();

        let months = self.db.receipts().all_months_in(&mut tx).await?;
        let credits = payee_credit_total(&ledger_entries(&months), payee);
        let collected = received.watermark_in(&mut tx, payee).await?;
        let pending = credits - collected;

        validate_collect(payee, amount, pending)?;

        let total_received = received.add_in(&mut tx, payee, amount, Utc::now()).await?;
        let mode_total = received.add_mode_in(&mut tx, target_mode, amount).await?;
        tx.commit().await?;

        Ok(CollectOutcome {
            payee: payee.to_string(),
            amount,
            target_mode: target_mode.to_string(),
            pending_before: pending,
            pending_after: pending - amount,
            total_received,
            mode_total,
        })
    }

    /// What the payee still holds, derived from the full ledger.
    pub async fn pending(&self, payee: &str) -> LedgerResult<PayeePending> {
        let months = self.db.receipts().all_months().await?;
        let credits = payee_credit_total(&ledger_entries(&months), payee);
        let collected = self.db.received_money().watermark(payee).await?;
        Ok(PayeePending::new(payee, credits, collected))
    }
}
