//! # Ledger Writer
//!
//! Records and edits payments across their three representations: the
//! month ledger, the booking (or cancellation record) and the payee
//! sub-ledger.
//!
//! ## Record Payment Saga
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_payment(draft, target)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate (no writes on rejection)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────── one write transaction ───────────────────────┐   │
//! │  │  allocate slNo from settings/slCounter                         │   │
//! │  │  moneyReceipts/{month}[slNo] = payment                         │   │
//! │  │  mirror_outbox += booking / refund / sub-ledger copies         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │ commit (Busy → backoff and rerun the whole transaction)        │
//! │       ▼                                                                 │
//! │  apply each queued copy; failures stay queued and are reported         │
//! │                                                                         │
//! │  The ledger entry is the fact. Copies are replayable by slNo.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use banquet_core::serial::highest_serial;
use banquet_core::validation::{
    validate_booking_id, validate_description, validate_mode, validate_month_key,
    validate_payee_name, validate_payment_amount, validate_receiver,
};
use banquet_core::{
    Approval, MirrorKind, MirrorOutboxEntry, Money, Payment, PaymentFor, PaymentMode,
    SerialCounter, Transaction, CASH_IN_HAND,
};
use banquet_db::{Database, WriteTx};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::AllocationSettings;
use crate::error::{LedgerError, LedgerResult};
use crate::mirror::{apply_or_record, plan_mirrors, MirrorFailure};
use crate::retry::with_write_retry;

// =============================================================================
// Inputs
// =============================================================================

/// A payment as entered on the receipt form, before it has a serial.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDraft {
    pub amount: Money,
    pub mode: PaymentMode,
    pub payment_for: PaymentFor,
    pub receipt_date: NaiveDate,
    pub receiver: String,
    pub cash_to: Option<String>,
    pub description: String,
    pub approval: Approval,
    pub sender: Option<String>,
    pub party_name: Option<String>,
    pub my_name: Option<String>,
}

impl PaymentDraft {
    /// Draft with the required fields; the rest start empty and accepted.
    pub fn new(
        amount: Money,
        mode: PaymentMode,
        payment_for: PaymentFor,
        receipt_date: NaiveDate,
        receiver: impl Into<String>,
    ) -> Self {
        PaymentDraft {
            amount,
            mode,
            payment_for,
            receipt_date,
            receiver: receiver.into(),
            cash_to: None,
            description: String::new(),
            approval: Approval::Accepted,
            sender: None,
            party_name: None,
            my_name: None,
        }
    }

    pub fn cash_to(mut self, payee: impl Into<String>) -> Self {
        self.cash_to = Some(payee.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn approval(mut self, approval: Approval) -> Self {
        self.approval = approval;
        self
    }

    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Sub-ledger payee named on a cash draft, ignoring cash-in-hand.
    fn named_payee(&self) -> Option<&str> {
        if !self.mode.is_cash() {
            return None;
        }
        self.cash_to
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty() && *p != CASH_IN_HAND)
    }
}

/// What a payment is for, beyond the ledger itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentTarget {
    /// Advance on a live booking stored under `prebookings/{source_doc}`.
    Advance { source_doc: String, booking_id: String },
    /// Refund on a cancelled booking.
    Refund { booking_id: String },
    /// Ledger-only entry (expenses, transfers).
    Standalone,
}

impl PaymentTarget {
    fn is_refund(&self) -> bool {
        matches!(self, PaymentTarget::Refund { .. })
    }
}

/// Field changes for [`LedgerWriter::edit_payment`]. `None` keeps the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentChanges {
    pub amount: Option<Money>,
    pub mode: Option<PaymentMode>,
    pub receipt_date: Option<NaiveDate>,
    pub receiver: Option<String>,
    /// `Some(None)` clears the payee.
    pub cash_to: Option<Option<String>>,
    pub description: Option<String>,
    pub approval: Option<Approval>,
}

impl PaymentChanges {
    fn validate(&self) -> LedgerResult<()> {
        if let Some(amount) = self.amount {
            validate_payment_amount(amount)?;
        }
        if let Some(mode) = &self.mode {
            validate_mode(mode)?;
        }
        if let Some(receiver) = &self.receiver {
            validate_receiver(receiver)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        if let Some(Some(payee)) = &self.cash_to {
            let payee = payee.trim();
            if !payee.is_empty() && payee != CASH_IN_HAND {
                validate_payee_name(payee)?;
            }
        }
        Ok(())
    }

    fn apply_to(&self, payment: &mut Payment) {
        if let Some(amount) = self.amount {
            payment.amount = amount;
        }
        if let Some(mode) = &self.mode {
            payment.mode = mode.clone();
        }
        if let Some(date) = self.receipt_date {
            payment.receipt_date = Some(date);
            payment.raw_receipt_date = None;
        }
        if let Some(receiver) = &self.receiver {
            payment.receiver = receiver.trim().to_string();
        }
        if let Some(cash_to) = &self.cash_to {
            payment.cash_to = cash_to
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string);
        }
        if let Some(description) = &self.description {
            payment.description = description.trim().to_string();
        }
        if let Some(approval) = self.approval {
            payment.approval = approval;
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of a successful `record_payment`.
///
/// The payment is durable even when `mirrors_pending` is not empty; those
/// copies are retried by the mirror processor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordOutcome {
    pub payment: Payment,
    pub month: String,
    pub mirrors_applied: Vec<MirrorKind>,
    pub mirrors_pending: Vec<MirrorFailure>,
}

impl RecordOutcome {
    pub fn sl_no(&self) -> &str {
        &self.payment.sl_no
    }

    pub fn is_fully_mirrored(&self) -> bool {
        self.mirrors_pending.is_empty()
    }
}

/// A copy the edit expected to find but did not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditMiss {
    Booking { booking_id: String },
    SubLedger { payee: String },
}

/// Which stored copy of the payment an edit rewrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyLocation {
    Booking,
    Refund,
    None,
}

/// Result of a successful `edit_payment`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditOutcome {
    pub payment: Payment,
    pub previous_month: String,
    pub month: String,
    pub copy: CopyLocation,
    /// Sub-ledger holding the payment after the edit.
    pub sub_ledger: Option<String>,
    pub misses: Vec<EditMiss>,
}

// =============================================================================
// Ledger Writer
// =============================================================================

/// Entry point for every write that creates or changes a payment.
#[derive(Debug, Clone)]
pub struct LedgerWriter {
    db: Database,
    retry: AllocationSettings,
}

impl LedgerWriter {
    pub fn new(db: Database, retry: AllocationSettings) -> Self {
        LedgerWriter { db, retry }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn retry_settings(&self) -> &AllocationSettings {
        &self.retry
    }

    // =========================================================================
    // Record
    // =========================================================================

    /// Allocates a serial, writes the ledger entry and applies its copies.
    ///
    /// Fails only when nothing was written: a rejected draft, or a write
    /// lock that stayed busy past the retry budget.
    pub async fn record_payment(
        &self,
        draft: PaymentDraft,
        target: PaymentTarget,
    ) -> LedgerResult<RecordOutcome> {
        validate_draft(&draft, &target)?;
        let template = draft_to_payment(&draft, &target);
        let counter = SerialCounter::for_payment(target.is_refund(), template.payment_for, &template.mode);

        let (payment, month, queued) = with_write_retry(&self.retry, "record_payment", || {
            self.try_record(&template, counter, &target)
        })
        .await?;

        info!(
            sl_no = %payment.sl_no,
            month = %month,
            amount = %payment.amount,
            booking_id = payment.booking_id.as_deref().unwrap_or(""),
            mirrors = queued.len(),
            "Payment recorded"
        );

        let mut outcome = RecordOutcome {
            payment,
            month,
            mirrors_applied: Vec::new(),
            mirrors_pending: Vec::new(),
        };
        for entry in &queued {
            match apply_or_record(&self.db, entry).await {
                None => outcome.mirrors_applied.push(entry.kind),
                Some(failure) => outcome.mirrors_pending.push(failure),
            }
        }
        Ok(outcome)
    }

    async fn try_record(
        &self,
        template: &Payment,
        counter: SerialCounter,
        target: &PaymentTarget,
    ) -> LedgerResult<(Payment, String, Vec<MirrorOutboxEntry>)> {
        let mut tx = self.db.begin_write().await?;
        let counters = self.db.counters();

        let mut number = counters.allocate_in(&mut tx, counter).await?;
        let months = self.db.receipts().all_months_in(&mut tx).await?;
        let stored = || {
            months
                .values()
                .flat_map(|m| m.iter())
                .flat_map(|(key, p)| [key.as_str(), p.sl_no.as_str()])
        };
        if stored().any(|sl| sl == counter.format(number)) {
            // Counter lags the ledger (restored backup, hand-edited counter).
            let highest = highest_serial(stored(), counter);
            warn!(
                counter = counter.field_name(),
                stale = number,
                highest,
                "Serial counter behind the ledger, raising"
            );
            counters.raise_to_in(&mut tx, counter, highest).await?;
            number = counters.allocate_in(&mut tx, counter).await?;
        }

        let mut payment = template.clone();
        payment.sl_no = counter.format(number);

        let month = payment.month_key();
        if self.db.receipts().upsert_in(&mut tx, &month, &payment).await? {
            // Dropping the transaction rolls the counter back too.
            return Err(LedgerError::SerialConflict(payment.sl_no));
        }

        let mut queued = Vec::new();
        for mirror in plan_mirrors(&payment, target) {
            queued.push(self.db.outbox().enqueue_in(&mut tx, &mirror).await?);
        }

        tx.commit().await?;
        Ok((payment, month, queued))
    }

    /// Allocates a bare serial (e.g. `globalEvents` for decoration bookings).
    pub async fn allocate_serial(&self, counter: SerialCounter) -> LedgerResult<String> {
        let db = &self.db;
        let number = with_write_retry(&self.retry, "allocate_serial", move || async move {
            let mut tx = db.begin_write().await?;
            let number = db.counters().allocate_in(&mut tx, counter).await?;
            tx.commit().await?;
            Ok::<_, LedgerError>(number)
        })
        .await?;

        let serial = counter.format(number);
        info!(counter = counter.field_name(), serial = %serial, "Serial allocated");
        Ok(serial)
    }

    // =========================================================================
    // Edit
    // =========================================================================

    /// Updates a payment everywhere it is stored.
    ///
    /// The ledger copy must exist (`month_hint` is tried first, then every
    /// month). Booking, refund and sub-ledger copies are located by serial;
    /// any that cannot be found are logged and listed, not fatal.
    pub async fn edit_payment(
        &self,
        sl_no: &str,
        month_hint: Option<&str>,
        changes: PaymentChanges,
    ) -> LedgerResult<EditOutcome> {
        changes.validate()?;

        let outcome = with_write_retry(&self.retry, "edit_payment", || {
            self.try_edit(sl_no, month_hint, &changes)
        })
        .await?;

        info!(
            sl_no = %sl_no,
            from = %outcome.previous_month,
            month = %outcome.month,
            misses = outcome.misses.len(),
            "Payment edited"
        );
        Ok(outcome)
    }

    async fn try_edit(
        &self,
        sl_no: &str,
        month_hint: Option<&str>,
        changes: &PaymentChanges,
    ) -> LedgerResult<EditOutcome> {
        let mut tx = self.db.begin_write().await?;
        let receipts = self.db.receipts();

        let (previous_month, mut payment) = receipts
            .find_in(&mut tx, sl_no, month_hint)
            .await?
            .ok_or_else(|| LedgerError::PaymentNotFound(sl_no.to_string()))?;
        let previous_payee = payment.sub_ledger_payee().map(str::to_string);

        changes.apply_to(&mut payment);
        let month = payment.month_key();
        if month != previous_month {
            receipts.remove_in(&mut tx, &previous_month, sl_no).await?;
        }
        receipts.upsert_in(&mut tx, &month, &payment).await?;

        // Queued copies carry the old values.
        self.db.outbox().supersede_in(&mut tx, sl_no).await?;

        let mut misses = Vec::new();

        let copy = self.rewrite_booking_copy_in(&mut tx, &payment).await?;
        if copy == CopyLocation::None {
            if let Some(booking_id) = &payment.booking_id {
                warn!(sl_no = %sl_no, booking_id = %booking_id, "Edited payment not found on its booking");
                misses.push(EditMiss::Booking {
                    booking_id: booking_id.clone(),
                });
            }
        }

        let sub_ledger = self
            .rewrite_sub_ledger_in(&mut tx, &payment, previous_payee, &mut misses)
            .await?;

        tx.commit().await?;

        Ok(EditOutcome {
            payment,
            previous_month,
            month,
            copy,
            sub_ledger,
            misses,
        })
    }

    /// Replaces the booking advance or refund with this serial.
    async fn rewrite_booking_copy_in(&self, tx: &mut WriteTx, payment: &Payment) -> LedgerResult<CopyLocation> {
        let bookings = self.db.bookings();
        let sl_no = payment.sl_no.as_str();

        let hinted = match (payment.source_doc.as_deref(), payment.booking_id.as_deref()) {
            (Some(month), Some(id)) => bookings
                .get_in(tx, month, id)
                .await?
                .filter(|b| b.find_advance(sl_no).is_some()),
            _ => None,
        };
        let booking = match hinted {
            Some(b) => Some(b),
            None => bookings.find_by_payment_in(tx, sl_no).await?,
        };
        if let Some(mut booking) = booking {
            booking.upsert_advance(payment.clone());
            bookings.save_in(tx, &booking).await?;
            return Ok(CopyLocation::Booking);
        }

        let cancellations = self.db.cancellations();
        if let Some(mut record) = cancellations.find_by_refund_in(tx, sl_no).await? {
            record.upsert_refund(payment.clone());
            cancellations.save_in(tx, &record).await?;
            return Ok(CopyLocation::Refund);
        }

        Ok(CopyLocation::None)
    }

    /// Moves or rewrites the sub-ledger transaction. Returns the payee now
    /// holding it.
    async fn rewrite_sub_ledger_in(
        &self,
        tx: &mut WriteTx,
        payment: &Payment,
        previous_payee: Option<String>,
        misses: &mut Vec<EditMiss>,
    ) -> LedgerResult<Option<String>> {
        let accountant = self.db.accountant();
        let sl_no = payment.sl_no.as_str();

        let holder = accountant.find_transaction_in(tx, sl_no).await?;
        let wanted = payment.sub_ledger_payee().map(str::to_string);

        match (&holder, &previous_payee) {
            (None, Some(payee)) => {
                warn!(sl_no = %sl_no, payee = %payee, "Edited payment not found in sub-ledger");
                misses.push(EditMiss::SubLedger { payee: payee.clone() });
            }
            (Some(current), _) if wanted.as_ref() != Some(current) => {
                accountant.remove_transaction_in(tx, current, sl_no).await?;
                info!(sl_no = %sl_no, from = %current, to = wanted.as_deref().unwrap_or("-"), "Sub-ledger entry moved");
            }
            _ => {}
        }

        if let Some(payee) = &wanted {
            accountant
                .upsert_transaction_in(tx, payee, Transaction::from(payment))
                .await?;
        }
        Ok(wanted)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn validate_draft(draft: &PaymentDraft, target: &PaymentTarget) -> LedgerResult<()> {
    validate_payment_amount(draft.amount)?;
    validate_mode(&draft.mode)?;
    validate_receiver(&draft.receiver)?;
    validate_description(&draft.description)?;
    if let Some(payee) = draft.named_payee() {
        validate_payee_name(payee)?;
    }

    match target {
        PaymentTarget::Advance {
            source_doc,
            booking_id,
        } => {
            validate_booking_id(booking_id)?;
            validate_month_key(source_doc)?;
            if draft.payment_for != PaymentFor::Credit {
                return Err(LedgerError::InvalidPayment(
                    "an advance on a booking must be a credit".into(),
                ));
            }
        }
        PaymentTarget::Refund { booking_id } => {
            validate_booking_id(booking_id)?;
            if draft.payment_for != PaymentFor::Debit {
                return Err(LedgerError::InvalidPayment("a refund must be a debit".into()));
            }
        }
        PaymentTarget::Standalone => {}
    }
    Ok(())
}

fn draft_to_payment(draft: &PaymentDraft, target: &PaymentTarget) -> Payment {
    let (booking_id, source_doc) = match target {
        PaymentTarget::Advance {
            source_doc,
            booking_id,
        } => (Some(booking_id.trim().to_string()), Some(source_doc.clone())),
        PaymentTarget::Refund { booking_id } => (Some(booking_id.trim().to_string()), None),
        PaymentTarget::Standalone => (None, None),
    };
    let trimmed = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    Payment {
        sl_no: String::new(),
        amount: draft.amount,
        mode: draft.mode.clone(),
        payment_for: draft.payment_for,
        receipt_date: Some(draft.receipt_date),
        raw_receipt_date: None,
        receiver: draft.receiver.trim().to_string(),
        cash_to: trimmed(&draft.cash_to),
        description: draft.description.trim().to_string(),
        approval: draft.approval,
        booking_id,
        source_doc,
        sender: trimmed(&draft.sender),
        party_name: trimmed(&draft.party_name),
        my_name: trimmed(&draft.my_name),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use banquet_core::reconcile::{consistency_report, ledger_entries};
    use banquet_core::{Booking, MirrorKind};
    use banquet_db::DbConfig;
    use std::collections::BTreeSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup() -> LedgerWriter {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.bookings()
            .save(&Booking {
                id: "b1".into(),
                source_doc: "Oct2025".into(),
                customer_name: "Sharma".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        LedgerWriter::new(db, AllocationSettings::default())
    }

    fn advance() -> PaymentTarget {
        PaymentTarget::Advance {
            source_doc: "Oct2025".into(),
            booking_id: "b1".into(),
        }
    }

    fn cash_credit(rupees: i64) -> PaymentDraft {
        PaymentDraft::new(
            Money::from_rupees(rupees),
            PaymentMode::Cash,
            PaymentFor::Credit,
            date(2025, 9, 14),
            "Ravi",
        )
    }

    #[tokio::test]
    async fn test_cash_advance_writes_all_three_copies() {
        let writer = setup().await;
        let db = writer.database().clone();

        let outcome = writer
            .record_payment(cash_credit(5_000).cash_to("Main-Locker"), advance())
            .await
            .unwrap();

        assert_eq!(outcome.sl_no(), "C1");
        assert_eq!(outcome.month, "Sep2025");
        assert!(outcome.is_fully_mirrored());
        assert_eq!(
            outcome.mirrors_applied,
            vec![MirrorKind::BookingAdvance, MirrorKind::PayeeSubLedger]
        );

        let month = db.receipts().month("Sep2025").await.unwrap();
        assert_eq!(month["C1"].amount, Money::from_rupees(5_000));
        let booking = db.bookings().get("Oct2025", "b1").await.unwrap().unwrap();
        assert_eq!(booking.find_advance("C1").unwrap().amount, Money::from_rupees(5_000));
        let locker = db.accountant().get("Main-Locker").await.unwrap().unwrap();
        assert_eq!(locker.transactions[0].sl_no, "C1");
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_counter_selection() {
        let writer = setup().await;

        let bank = PaymentDraft::new(
            Money::from_rupees(10_000),
            PaymentMode::Bank("HDFC Current".into()),
            PaymentFor::Credit,
            date(2025, 9, 15),
            "Ravi",
        );
        let bank = writer.record_payment(bank, advance()).await.unwrap();
        assert_eq!(bank.sl_no(), "1");

        let refund = PaymentDraft::new(
            Money::from_rupees(2_000),
            PaymentMode::Cash,
            PaymentFor::Debit,
            date(2025, 9, 20),
            "Ravi",
        );
        let refund = writer
            .record_payment(refund, PaymentTarget::Refund { booking_id: "b9".into() })
            .await
            .unwrap();
        assert_eq!(refund.sl_no(), "R1");

        let record = writer.database().cancellations().get("b9").await.unwrap().unwrap();
        assert_eq!(record.total_refunded(), Money::from_rupees(2_000));
    }

    #[tokio::test]
    async fn test_rejected_draft_writes_nothing() {
        let writer = setup().await;

        let zero = writer.record_payment(cash_credit(0), advance()).await;
        assert!(zero.unwrap_err().is_rejection());

        let debit_advance = PaymentDraft::new(
            Money::from_rupees(10),
            PaymentMode::Cash,
            PaymentFor::Debit,
            date(2025, 9, 14),
            "Ravi",
        );
        let err = writer.record_payment(debit_advance, advance()).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPayment(_)));

        let reserved = writer
            .record_payment(cash_credit(10).cash_to("BankNames"), PaymentTarget::Standalone)
            .await;
        assert!(reserved.unwrap_err().is_rejection());

        let db = writer.database();
        assert!(db.receipts().all_months().await.unwrap().is_empty());
        assert_eq!(db.counters().current(SerialCounter::CashMoneyReceipt).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_booking_keeps_ledger_and_queues_mirror() {
        let writer = setup().await;
        let target = PaymentTarget::Advance {
            source_doc: "Oct2025".into(),
            booking_id: "ghost".into(),
        };

        let outcome = writer.record_payment(cash_credit(1_500), target).await.unwrap();

        assert!(!outcome.is_fully_mirrored());
        assert_eq!(outcome.mirrors_pending[0].kind, MirrorKind::BookingAdvance);
        let db = writer.database();
        assert!(db.receipts().find("C1", None).await.unwrap().is_some());
        assert_eq!(db.outbox().count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_booking_matches_ledger_after_recording() {
        let writer = setup().await;
        writer.record_payment(cash_credit(5_000), advance()).await.unwrap();
        writer.record_payment(cash_credit(7_500), advance()).await.unwrap();

        let db = writer.database();
        let booking = db.bookings().get("Oct2025", "b1").await.unwrap().unwrap();
        let ledger = ledger_entries(&db.receipts().all_months().await.unwrap());
        let report = consistency_report(&booking, &ledger);

        assert!(report.is_consistent());
        assert_eq!(report.booking_total, Money::from_rupees(12_500));
        assert_eq!(report.ledger_total, Money::from_rupees(12_500));
    }

    #[tokio::test]
    async fn test_lagging_counter_never_overwrites_entries() {
        let writer = setup().await;
        let db = writer.database().clone();

        // Ledger restored without its counter document.
        let mut tx = db.begin_write().await.unwrap();
        tx.store(
            banquet_db::collection::MONEY_RECEIPTS,
            "Aug2025",
            &serde_json::json!({
                "C1": {"amount": 9999, "paymentFor": "Credit", "mode": "Cash", "receiver": "Old",
                       "receiptDate": "2025-08-01"},
                "C4": {"amount": 250, "paymentFor": "Credit", "mode": "Cash", "receiver": "Old",
                       "receiptDate": "2025-08-02"}
            }),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let outcome = writer
            .record_payment(cash_credit(10), PaymentTarget::Standalone)
            .await
            .unwrap();
        assert_eq!(outcome.sl_no(), "C5");
        assert_eq!(db.counters().current(SerialCounter::CashMoneyReceipt).await.unwrap(), 5);

        let august = db.receipts().month("Aug2025").await.unwrap();
        assert_eq!(august["C1"].receiver, "Old");
        assert_eq!(august["C1"].amount, Money::from_rupees(9_999));
        assert_eq!(db.receipts().month("Sep2025").await.unwrap()["C5"].receiver, "Ravi");

        let next = writer
            .record_payment(cash_credit(20), PaymentTarget::Standalone)
            .await
            .unwrap();
        assert_eq!(next.sl_no(), "C6");
    }

    #[tokio::test]
    async fn test_concurrent_records_get_distinct_serials() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("ledger.db")))
            .await
            .unwrap();
        let writer = LedgerWriter::new(db, AllocationSettings::default());

        let mut handles = Vec::new();
        for i in 0..8 {
            let writer = writer.clone();
            handles.push(tokio::spawn(async move {
                writer
                    .record_payment(cash_credit(100 + i), PaymentTarget::Standalone)
                    .await
                    .unwrap()
                    .payment
                    .sl_no
            }));
        }

        let mut serials = BTreeSet::new();
        for handle in handles {
            serials.insert(handle.await.unwrap());
        }
        let expected: BTreeSet<String> = (1..=8).map(|n| format!("C{n}")).collect();
        assert_eq!(serials, expected);
        assert_eq!(writer.database().receipts().month("Sep2025").await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_edit_moves_month_and_payee() {
        let writer = setup().await;
        writer
            .record_payment(cash_credit(5_000).cash_to("Main-Locker"), advance())
            .await
            .unwrap();

        let changes = PaymentChanges {
            amount: Some(Money::from_rupees(6_000)),
            receipt_date: Some(date(2025, 10, 2)),
            cash_to: Some(Some("Abhishek-Bank".into())),
            ..Default::default()
        };
        let outcome = writer.edit_payment("C1", Some("Sep2025"), changes).await.unwrap();

        assert_eq!(outcome.previous_month, "Sep2025");
        assert_eq!(outcome.month, "Oct2025");
        assert_eq!(outcome.copy, CopyLocation::Booking);
        assert_eq!(outcome.sub_ledger.as_deref(), Some("Abhishek-Bank"));
        assert!(outcome.misses.is_empty());

        let db = writer.database();
        assert!(db.receipts().month("Sep2025").await.unwrap().is_empty());
        assert_eq!(db.receipts().month("Oct2025").await.unwrap()["C1"].amount, Money::from_rupees(6_000));
        let booking = db.bookings().get("Oct2025", "b1").await.unwrap().unwrap();
        assert_eq!(booking.advance_payments.len(), 1);
        assert_eq!(booking.total_paid(), Money::from_rupees(6_000));
        assert!(db.accountant().get("Main-Locker").await.unwrap().unwrap().transactions.is_empty());
        assert_eq!(
            db.accountant().get("Abhishek-Bank").await.unwrap().unwrap().transactions[0].amount,
            Money::from_rupees(6_000)
        );
    }

    #[tokio::test]
    async fn test_edit_scans_when_hint_misses() {
        let writer = setup().await;
        writer.record_payment(cash_credit(5_000), advance()).await.unwrap();

        let changes = PaymentChanges {
            description: Some("Second instalment".into()),
            ..Default::default()
        };
        let outcome = writer.edit_payment("C1", Some("Jan2024"), changes).await.unwrap();
        assert_eq!(outcome.month, "Sep2025");
        assert_eq!(outcome.payment.description, "Second instalment");
    }

    #[tokio::test]
    async fn test_edit_with_lost_copies_still_updates_ledger() {
        let writer = setup().await;
        let db = writer.database().clone();
        writer
            .record_payment(cash_credit(5_000).cash_to("Main-Locker"), advance())
            .await
            .unwrap();

        // Simulate copies lost to a partial write.
        let mut tx = db.begin_write().await.unwrap();
        db.bookings().remove_in(&mut tx, "Oct2025", "b1").await.unwrap();
        db.accountant().remove_transaction_in(&mut tx, "Main-Locker", "C1").await.unwrap();
        tx.commit().await.unwrap();

        let changes = PaymentChanges {
            approval: Some(Approval::Rejected),
            ..Default::default()
        };
        let outcome = writer.edit_payment("C1", None, changes).await.unwrap();

        assert_eq!(outcome.copy, CopyLocation::None);
        assert_eq!(
            outcome.misses,
            vec![
                EditMiss::Booking { booking_id: "b1".into() },
                EditMiss::SubLedger { payee: "Main-Locker".into() },
            ]
        );
        let stored = db.receipts().find("C1", None).await.unwrap().unwrap().1;
        assert_eq!(stored.approval, Approval::Rejected);
    }

    #[tokio::test]
    async fn test_edit_unknown_serial() {
        let writer = setup().await;
        let err = writer
            .edit_payment("C404", None, PaymentChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::PaymentNotFound(_)));
    }

    #[tokio::test]
    async fn test_allocate_event_serial() {
        let writer = setup().await;
        assert_eq!(writer.allocate_serial(SerialCounter::GlobalEvents).await.unwrap(), "1");
        assert_eq!(writer.allocate_serial(SerialCounter::GlobalEvents).await.unwrap(), "2");
    }
}
