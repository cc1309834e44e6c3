//! # Mirror Processor
//!
//! Applies queued mirrors: the booking, refund and sub-ledger copies of a
//! ledger entry.
//!
//! ## Mirror Processing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Mirror Processor Flow                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    mirror_outbox Table                          │   │
//! │  │                                                                 │   │
//! │  │  id | sl_no | kind             | payload | attempts | applied  │   │
//! │  │  ───┼───────┼──────────────────┼─────────┼──────────┼──────────│   │
//! │  │  1  │ C87   │ booking_advance  │ {...}   │ 0        │ NULL     │   │
//! │  │  2  │ C87   │ payee_sub_ledger │ {...}   │ 2        │ NULL     │   │
//! │  │  3  │ R4    │ refund_record    │ {...}   │ 1        │ 2025-09  │   │
//! │  └────────────────────────────┬────────────────────────────────────┘   │
//! │                               │                                         │
//! │                               ▼                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  1. Poll: pending rows with attempts < max_attempts            │   │
//! │  │  2. Per row, one write transaction:                            │   │
//! │  │        apply the copy (replace by slNo) + mark applied         │   │
//! │  │  3. On failure: attempts += 1, last_error = reason             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  TIMING:                                                               │
//! │  • Poll interval: 5 seconds (configurable)                             │
//! │  • Batch size: 100 rows (configurable)                                 │
//! │  • Max attempts: 10 (then left for `drain-outbox` / an operator)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;
use std::time::Duration;

use banquet_core::{MirrorKind, MirrorOutboxEntry, MirrorTarget, Payment, Transaction};
use banquet_db::{Database, WriteTx};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::OutboxSettings;
use crate::error::{LedgerError, LedgerResult};
use crate::writer::PaymentTarget;

// =============================================================================
// Planning
// =============================================================================

/// The copies a freshly recorded payment needs.
pub fn plan_mirrors(payment: &Payment, target: &PaymentTarget) -> Vec<MirrorTarget> {
    let mut mirrors = Vec::new();

    match target {
        PaymentTarget::Advance {
            source_doc,
            booking_id,
        } => mirrors.push(MirrorTarget::BookingAdvance {
            source_doc: source_doc.clone(),
            booking_id: booking_id.clone(),
            payment: payment.clone(),
        }),
        PaymentTarget::Refund { booking_id } => mirrors.push(MirrorTarget::RefundRecord {
            booking_id: booking_id.clone(),
            payment: payment.clone(),
        }),
        PaymentTarget::Standalone => {}
    }

    if let Some(payee) = payment.sub_ledger_payee() {
        mirrors.push(MirrorTarget::PayeeSubLedger {
            payee: payee.to_string(),
            transaction: Transaction::from(payment),
        });
    }

    mirrors
}

// =============================================================================
// Applying
// =============================================================================

/// Writes one copy inside an open transaction.
pub async fn apply_target_in(db: &Database, tx: &mut WriteTx, target: &MirrorTarget) -> LedgerResult<()> {
    match target {
        MirrorTarget::BookingAdvance {
            source_doc,
            booking_id,
            payment,
        } => {
            let hint = (!source_doc.is_empty()).then_some(source_doc.as_str());
            db.bookings()
                .upsert_advance_in(tx, hint, booking_id, payment.clone())
                .await?
                .ok_or_else(|| LedgerError::BookingNotFound(booking_id.clone()))?;
        }
        MirrorTarget::RefundRecord { booking_id, payment } => {
            db.cancellations()
                .upsert_refund_in(tx, booking_id, payment.clone())
                .await?;
        }
        MirrorTarget::PayeeSubLedger { payee, transaction } => {
            db.accountant()
                .upsert_transaction_in(tx, payee, transaction.clone())
                .await?;
        }
    }
    Ok(())
}

/// Applies a queued mirror and marks it applied, atomically.
pub async fn apply_entry(db: &Database, entry: &MirrorOutboxEntry) -> LedgerResult<()> {
    let target: MirrorTarget = serde_json::from_str(&entry.payload)?;

    let mut tx = db.begin_write().await?;
    apply_target_in(db, &mut tx, &target).await?;
    db.outbox().mark_applied_in(&mut tx, &entry.id).await?;
    tx.commit().await?;

    debug!(sl_no = %entry.sl_no, kind = entry.kind.as_str(), "Mirror applied");
    Ok(())
}

/// A mirror that did not apply on this attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MirrorFailure {
    pub outbox_id: String,
    pub sl_no: String,
    pub kind: MirrorKind,
    pub error: String,
}

/// Applies a mirror, recording the failure on the row when it does not go
/// through. The returned failure is informational: the ledger is intact.
pub async fn apply_or_record(db: &Database, entry: &MirrorOutboxEntry) -> Option<MirrorFailure> {
    let err = match apply_entry(db, entry).await {
        Ok(()) => return None,
        Err(e) => e,
    };

    warn!(
        sl_no = %entry.sl_no,
        kind = entry.kind.as_str(),
        attempt = entry.attempts + 1,
        error = %err,
        "Mirror failed, left pending"
    );
    if let Err(e) = db.outbox().mark_failed(&entry.id, &err.to_string()).await {
        error!(?e, id = %entry.id, "Failed to record mirror failure");
    }

    Some(MirrorFailure {
        outbox_id: entry.id.clone(),
        sl_no: entry.sl_no.clone(),
        kind: entry.kind,
        error: err.to_string(),
    })
}

// =============================================================================
// Drain
// =============================================================================

/// Result of one replay of the outbox.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrainSummary {
    pub applied: usize,
    pub failed: Vec<MirrorFailure>,
    /// Rows that used up their attempts and are no longer replayed.
    pub exhausted: usize,
}

/// Replays every pending mirror once.
///
/// Rows that fail are not retried within the same drain.
pub async fn drain_pending(db: &Database, settings: &OutboxSettings) -> LedgerResult<DrainSummary> {
    let mut summary = DrainSummary::default();
    let mut tried: HashSet<String> = HashSet::new();

    loop {
        let batch: Vec<MirrorOutboxEntry> = db
            .outbox()
            .pending(settings.batch_size.saturating_add(tried.len() as u32), settings.max_attempts)
            .await?
            .into_iter()
            .filter(|e| !tried.contains(&e.id))
            .collect();
        if batch.is_empty() {
            break;
        }

        for entry in batch {
            tried.insert(entry.id.clone());
            match apply_or_record(db, &entry).await {
                None => summary.applied += 1,
                Some(failure) => summary.failed.push(failure),
            }
        }
    }

    summary.exhausted = db.outbox().exhausted(settings.max_attempts).await?.len();
    if summary.applied > 0 || !summary.failed.is_empty() {
        info!(
            applied = summary.applied,
            failed = summary.failed.len(),
            exhausted = summary.exhausted,
            "Mirror outbox drained"
        );
    }
    Ok(summary)
}

// =============================================================================
// Background Processor
// =============================================================================

/// Replays pending mirrors on an interval until shut down.
pub struct MirrorProcessor {
    db: Database,
    settings: OutboxSettings,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling the mirror processor.
#[derive(Clone)]
pub struct MirrorProcessorHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl MirrorProcessorHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> LedgerResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| LedgerError::Internal("Mirror processor already stopped".into()))
    }
}

impl MirrorProcessor {
    pub fn new(db: Database, settings: OutboxSettings) -> (Self, MirrorProcessorHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let processor = MirrorProcessor {
            db,
            settings,
            shutdown_rx,
        };
        (processor, MirrorProcessorHandle { shutdown_tx })
    }

    /// Runs the processor loop. Spawn it as a background task.
    pub async fn run(mut self) {
        info!(
            poll_interval_secs = self.settings.poll_interval_secs,
            "Mirror processor starting"
        );

        let mut interval = tokio::time::interval(Duration::from_secs(self.settings.poll_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.process_batch().await {
                        error!(?e, "Failed to process mirror batch");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Mirror processor shutting down");
                    break;
                }
            }
        }

        info!("Mirror processor stopped");
    }

    async fn process_batch(&self) -> LedgerResult<()> {
        let purged = self.db.outbox().cleanup_applied(self.settings.retention_days).await?;
        if purged > 0 {
            debug!(purged, "Purged applied mirrors");
        }

        let entries = self
            .db
            .outbox()
            .pending(self.settings.batch_size, self.settings.max_attempts)
            .await?;

        if entries.is_empty() {
            return Ok(());
        }

        debug!(count = entries.len(), "Replaying mirrors");
        for entry in &entries {
            if apply_or_record(&self.db, entry).await.is_some()
                && entry.attempts + 1 >= i64::from(self.settings.max_attempts)
            {
                warn!(
                    sl_no = %entry.sl_no,
                    kind = entry.kind.as_str(),
                    "Mirror exceeded max attempts, needs an operator"
                );
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use banquet_core::{Approval, Booking, Money, PaymentFor, PaymentMode};
    use banquet_db::DbConfig;
    use chrono::NaiveDate;

    fn payment(sl_no: &str, cash_to: Option<&str>) -> Payment {
        Payment {
            sl_no: sl_no.to_string(),
            amount: Money::from_rupees(5_000),
            mode: PaymentMode::Cash,
            payment_for: PaymentFor::Credit,
            receipt_date: NaiveDate::from_ymd_opt(2025, 9, 14),
            raw_receipt_date: None,
            receiver: "Ravi".to_string(),
            cash_to: cash_to.map(str::to_string),
            description: "Advance".to_string(),
            approval: Approval::Accepted,
            booking_id: Some("b1".to_string()),
            source_doc: Some("Oct2025".to_string()),
            sender: None,
            party_name: None,
            my_name: None,
        }
    }

    async fn enqueue(db: &Database, target: &MirrorTarget) -> MirrorOutboxEntry {
        let mut tx = db.begin_write().await.unwrap();
        let entry = db.outbox().enqueue_in(&mut tx, target).await.unwrap();
        tx.commit().await.unwrap();
        entry
    }

    #[test]
    fn test_plan_advance_with_locker() {
        let p = payment("C1", Some("Main-Locker"));
        let target = PaymentTarget::Advance {
            source_doc: "Oct2025".into(),
            booking_id: "b1".into(),
        };
        let kinds: Vec<MirrorKind> = plan_mirrors(&p, &target).iter().map(|m| m.kind()).collect();
        assert_eq!(kinds, vec![MirrorKind::BookingAdvance, MirrorKind::PayeeSubLedger]);
    }

    #[test]
    fn test_plan_skips_cash_in_hand() {
        let p = payment("C1", Some("Cash-Cash"));
        assert!(plan_mirrors(&p, &PaymentTarget::Standalone).is_empty());

        let mut bank = payment("12", Some("Main-Locker"));
        bank.mode = PaymentMode::Bank("HDFC Current".into());
        assert!(plan_mirrors(&bank, &PaymentTarget::Standalone).is_empty());
    }

    #[tokio::test]
    async fn test_apply_is_idempotent_by_serial() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.bookings()
            .save(&Booking {
                id: "b1".into(),
                source_doc: "Oct2025".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let target = MirrorTarget::BookingAdvance {
            source_doc: "Oct2025".into(),
            booking_id: "b1".into(),
            payment: payment("C1", None),
        };
        let first = enqueue(&db, &target).await;
        apply_entry(&db, &first).await.unwrap();
        let second = enqueue(&db, &target).await;
        apply_entry(&db, &second).await.unwrap();

        let booking = db.bookings().get("Oct2025", "b1").await.unwrap().unwrap();
        assert_eq!(booking.advance_payments.len(), 1);
        assert_eq!(booking.total_paid(), Money::from_rupees(5_000));
    }

    #[tokio::test]
    async fn test_missing_booking_stays_pending() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let entry = enqueue(
            &db,
            &MirrorTarget::BookingAdvance {
                source_doc: "Oct2025".into(),
                booking_id: "ghost".into(),
                payment: payment("C1", None),
            },
        )
        .await;

        let failure = apply_or_record(&db, &entry).await.unwrap();
        assert_eq!(failure.kind, MirrorKind::BookingAdvance);
        assert!(failure.error.contains("ghost"));

        let row = db.outbox().get(&entry.id).await.unwrap().unwrap();
        assert_eq!(row.attempts, 1);
        assert!(row.applied_at.is_none());
    }

    #[tokio::test]
    async fn test_drain_applies_once_booking_exists() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = OutboxSettings::default();
        enqueue(
            &db,
            &MirrorTarget::BookingAdvance {
                source_doc: "Oct2025".into(),
                booking_id: "b1".into(),
                payment: payment("C1", None),
            },
        )
        .await;
        enqueue(
            &db,
            &MirrorTarget::PayeeSubLedger {
                payee: "Main-Locker".into(),
                transaction: Transaction::from(&payment("C1", Some("Main-Locker"))),
            },
        )
        .await;

        let summary = drain_pending(&db, &settings).await.unwrap();
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.failed.len(), 1);

        db.bookings()
            .save(&Booking {
                id: "b1".into(),
                source_doc: "Oct2025".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let summary = drain_pending(&db, &settings).await.unwrap();
        assert_eq!(summary.applied, 1);
        assert!(summary.failed.is_empty());
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);

        let locker = db.accountant().get("Main-Locker").await.unwrap().unwrap();
        assert_eq!(locker.transactions.len(), 1);
    }

    #[tokio::test]
    async fn test_processor_shutdown() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (processor, handle) = MirrorProcessor::new(db, OutboxSettings::default());
        let task = tokio::spawn(processor.run());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
