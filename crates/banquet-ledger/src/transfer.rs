//! # Ledger Import / Export
//!
//! Bulk transfer between `moneyReceipts` and a flat CSV file, one row per
//! payment with camelCase headers named after the payment fields.
//!
//! ## Import
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  row ──► receiptDate: serial / dd-mm-yyyy / dd/mm/yy / yyyy-mm-dd      │
//! │            unreadable ──► UnknownMonth, cell kept as rawReceiptDate    │
//! │      ──► key: slNo, or a UUID v5 of the row content (plus its          │
//! │          occurrence number when the same content repeats)              │
//! │      ──► moneyReceipts/{month}[key] = payment (merge, not replace doc) │
//! │                                                                         │
//! │  Same file twice ──► same keys ──► second run adds nothing             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every partition is merged in a single write transaction, and serial
//! counters are lifted past any imported receipt numbers so new receipts
//! cannot reuse them.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use banquet_core::calendar::parse_import_date;
use banquet_core::reconcile::ledger_entries;
use banquet_core::serial::{import_key, parse_serial};
use banquet_core::{Approval, Money, Payment, PaymentFor, PaymentMode, SerialCounter, UNKNOWN_MONTH};
use banquet_db::Database;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AllocationSettings;
use crate::error::{LedgerError, LedgerResult};
use crate::retry::with_write_retry;

// =============================================================================
// Row Format
// =============================================================================

/// One CSV line. Every cell is text; parsing happens in [`CsvRow::into_payment`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CsvRow {
    sl_no: String,
    amount: String,
    mode: String,
    payment_for: String,
    receipt_date: String,
    receiver: String,
    cash_to: String,
    description: String,
    approval: String,
    booking_id: String,
    source_doc: String,
    sender: String,
    party_name: String,
    my_name: String,
}

fn cell(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl CsvRow {
    fn from_payment(payment: &Payment) -> Self {
        let receipt_date = match (payment.receipt_date, &payment.raw_receipt_date) {
            (Some(date), _) => date.format("%Y-%m-%d").to_string(),
            (None, Some(raw)) => raw.clone(),
            (None, None) => String::new(),
        };
        CsvRow {
            sl_no: payment.sl_no.clone(),
            amount: payment.amount.to_fixed(),
            mode: payment.mode.as_str().to_string(),
            payment_for: payment.payment_for.as_str().to_string(),
            receipt_date,
            receiver: payment.receiver.clone(),
            cash_to: payment.cash_to.clone().unwrap_or_default(),
            description: payment.description.clone(),
            approval: payment.approval.as_str().to_string(),
            booking_id: payment.booking_id.clone().unwrap_or_default(),
            source_doc: payment.source_doc.clone().unwrap_or_default(),
            sender: payment.sender.clone().unwrap_or_default(),
            party_name: payment.party_name.clone().unwrap_or_default(),
            my_name: payment.my_name.clone().unwrap_or_default(),
        }
    }

    /// Content of every cell except the serial, for keying rows without one.
    fn content_key(&self) -> String {
        [
            &self.amount,
            &self.mode,
            &self.payment_for,
            &self.receipt_date,
            &self.receiver,
            &self.cash_to,
            &self.description,
            &self.approval,
            &self.booking_id,
            &self.source_doc,
            &self.sender,
            &self.party_name,
            &self.my_name,
        ]
        .iter()
        .map(|c| c.trim())
        .collect::<Vec<_>>()
        .join("\u{1f}")
    }

    /// `occurrence` counts earlier rows in the same file with identical
    /// content, so repeated rows keep distinct keys.
    fn into_payment(self, line: usize, occurrence: usize) -> Payment {
        let sl_no = cell(&self.sl_no).unwrap_or_else(|| {
            let content = self.content_key();
            match occurrence {
                0 => import_key(&content),
                n => import_key(&format!("{content}\u{1f}#{n}")),
            }
        });

        let receipt_date = parse_import_date(&self.receipt_date);
        let raw_receipt_date = if receipt_date.is_none() { cell(&self.receipt_date) } else { None };

        let payment_for = PaymentFor::parse(&self.payment_for).unwrap_or_else(|| {
            warn!(line, value = %self.payment_for, "Unknown paymentFor, treating as Debit");
            PaymentFor::Debit
        });
        let approval = Approval::parse(&self.approval).unwrap_or_else(|| {
            warn!(line, value = %self.approval, "Unknown approval, treating as Accepted");
            Approval::Accepted
        });

        Payment {
            sl_no,
            amount: Money::parse_lenient(&self.amount),
            mode: PaymentMode::parse(&self.mode),
            payment_for,
            receipt_date,
            raw_receipt_date,
            receiver: self.receiver.trim().to_string(),
            cash_to: cell(&self.cash_to),
            description: self.description.trim().to_string(),
            approval,
            booking_id: cell(&self.booking_id),
            source_doc: cell(&self.source_doc),
            sender: cell(&self.sender),
            party_name: cell(&self.party_name),
            my_name: cell(&self.my_name),
        }
    }
}

// =============================================================================
// Summaries
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSummary {
    pub rows: usize,
    pub added: usize,
}

/// What an import did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Data rows read.
    pub rows: usize,
    /// Distinct keys that were not in the ledger before.
    pub added: usize,
    /// Distinct keys that were already there (overwritten in place).
    pub existing: usize,
    pub partitions: BTreeMap<String, PartitionSummary>,
    /// Keys of rows parked under `UnknownMonth`; these need an operator.
    pub undated: Vec<String>,
}

// =============================================================================
// Transfer
// =============================================================================

#[derive(Debug, Clone)]
pub struct LedgerTransfer {
    db: Database,
    retry: AllocationSettings,
}

impl LedgerTransfer {
    pub fn new(db: Database, retry: AllocationSettings) -> Self {
        LedgerTransfer { db, retry }
    }

    /// Writes every ledger entry, oldest first. Returns the row count.
    pub async fn export_to<W: Write>(&self, writer: W) -> LedgerResult<usize> {
        let months = self.db.receipts().all_months().await?;
        let entries = ledger_entries(&months);

        let mut csv = csv::Writer::from_writer(writer);
        for entry in &entries {
            csv.serialize(CsvRow::from_payment(entry))
                .map_err(|e| LedgerError::Export(e.to_string()))?;
        }
        csv.flush().map_err(|e| LedgerError::Export(e.to_string()))?;

        info!(rows = entries.len(), "Ledger exported");
        Ok(entries.len())
    }

    pub async fn export_path(&self, path: &Path) -> LedgerResult<usize> {
        let file = File::create(path)
            .map_err(|e| LedgerError::Export(format!("{}: {e}", path.display())))?;
        self.export_to(file).await
    }

    /// Reads a CSV and merges its rows into the ledger.
    pub async fn import_from<R: Read>(&self, reader: R) -> LedgerResult<ImportSummary> {
        let mut csv = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut summary = ImportSummary::default();
        let mut batches: BTreeMap<String, BTreeMap<String, Payment>> = BTreeMap::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (index, record) in csv.deserialize::<CsvRow>().enumerate() {
            // Header is line 1.
            let line = index + 2;
            let row = record.map_err(|e| LedgerError::Import(format!("line {line}: {e}")))?;
            let occurrence = if cell(&row.sl_no).is_none() {
                let count = seen.entry(row.content_key()).or_default();
                *count += 1;
                *count - 1
            } else {
                0
            };
            let payment = row.into_payment(line, occurrence);
            let month = payment.month_key();

            if month == UNKNOWN_MONTH {
                debug!(line, sl_no = %payment.sl_no, "Row has no readable date");
                summary.undated.push(payment.sl_no.clone());
            }
            summary.rows += 1;
            summary.partitions.entry(month.clone()).or_default().rows += 1;
            batches.entry(month).or_default().insert(payment.sl_no.clone(), payment);
        }

        let mut floors: HashMap<SerialCounter, u64> = HashMap::new();
        for (counter, number) in batches.values().flat_map(|b| b.keys()).filter_map(|k| parse_serial(k)) {
            let floor = floors.entry(counter).or_default();
            *floor = (*floor).max(number);
        }

        let db = &self.db;
        let batches_ref = &batches;
        let floors_ref = &floors;
        let added = with_write_retry(&self.retry, "import", move || async move {
            let mut tx = db.begin_write().await?;
            let mut added = BTreeMap::new();
            for (month, entries) in batches_ref {
                let count = db.receipts().merge_month_in(&mut tx, month, entries).await?;
                added.insert(month.clone(), count);
            }
            for (counter, floor) in floors_ref {
                db.counters().raise_to_in(&mut tx, *counter, *floor).await?;
            }
            tx.commit().await?;
            Ok::<_, LedgerError>(added)
        })
        .await?;

        let distinct: usize = batches.values().map(BTreeMap::len).sum();
        for (month, count) in added {
            summary.partitions.entry(month).or_default().added = count;
            summary.added += count;
        }
        summary.existing = distinct - summary.added;
        summary.undated.sort();
        summary.undated.dedup();

        if !summary.undated.is_empty() {
            warn!(count = summary.undated.len(), month = UNKNOWN_MONTH, "Imported rows have no readable date");
        }
        info!(
            rows = summary.rows,
            added = summary.added,
            existing = summary.existing,
            partitions = summary.partitions.len(),
            "Ledger imported"
        );
        Ok(summary)
    }

    pub async fn import_path(&self, path: &Path) -> LedgerResult<ImportSummary> {
        let file = File::open(path)
            .map_err(|e| LedgerError::Import(format!("{}: {e}", path.display())))?;
        self.import_from(file).await
    }
}
