//! # Serial Counter Repository
//!
//! Read-increment-write of the named counters in `settings/slCounter`.
//!
//! ## Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Submitter A                         Submitter B                        │
//! │     │ begin_write (lock taken)          │ begin_write ... waits         │
//! │     │ read cashMoneyReceipt = 86        │                               │
//! │     │ write 87                          │                               │
//! │     │ merge receipt C87                 │                               │
//! │     │ commit ───────────────────────────► lock taken                    │
//! │     ▼                                   │ read 87, write 88, C88        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The counter write and the receipt that uses it commit together. If the
//! transaction fails, neither is visible and the caller retries from scratch.

use serde_json::{Map, Value};
use tracing::debug;

use banquet_core::SerialCounter;

use crate::documents::{collection, DocumentStore, WriteTx};
use crate::error::DbResult;

/// Document holding every counter.
pub const SL_COUNTER_DOC: &str = "slCounter";

/// Repository for `settings/slCounter`.
#[derive(Debug, Clone)]
pub struct CounterRepository {
    store: DocumentStore,
}

/// Counter values written by hand may be numbers or numeric strings.
fn counter_value(doc: &Map<String, Value>, counter: SerialCounter) -> u64 {
    match doc.get(counter.field_name()) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

impl CounterRepository {
    pub fn new(store: DocumentStore) -> Self {
        CounterRepository { store }
    }

    /// Last value handed out (0 when never used).
    pub async fn current(&self, counter: SerialCounter) -> DbResult<u64> {
        let doc: Option<Map<String, Value>> =
            self.store.load(collection::SETTINGS, SL_COUNTER_DOC).await?;
        Ok(doc.map(|d| counter_value(&d, counter)).unwrap_or(0))
    }

    /// Allocates the next value inside an open write transaction.
    pub async fn allocate_in(&self, tx: &mut WriteTx, counter: SerialCounter) -> DbResult<u64> {
        let mut doc: Map<String, Value> = tx
            .load(collection::SETTINGS, SL_COUNTER_DOC)
            .await?
            .unwrap_or_default();

        let next = counter_value(&doc, counter) + 1;
        doc.insert(counter.field_name().to_string(), Value::from(next));
        tx.store(collection::SETTINGS, SL_COUNTER_DOC, &doc).await?;

        debug!(counter = counter.field_name(), value = next, "Allocated serial");
        Ok(next)
    }

    /// Lifts a counter to at least `floor` so serials already present in the
    /// ledger (imported rows) are never handed out again. Returns true when
    /// the counter moved.
    pub async fn raise_to_in(&self, tx: &mut WriteTx, counter: SerialCounter, floor: u64) -> DbResult<bool> {
        let mut doc: Map<String, Value> = tx
            .load(collection::SETTINGS, SL_COUNTER_DOC)
            .await?
            .unwrap_or_default();

        if counter_value(&doc, counter) >= floor {
            return Ok(false);
        }
        doc.insert(counter.field_name().to_string(), Value::from(floor));
        tx.store(collection::SETTINGS, SL_COUNTER_DOC, &doc).await?;

        debug!(counter = counter.field_name(), value = floor, "Counter raised");
        Ok(true)
    }

    /// Allocates the next value in its own transaction.
    ///
    /// For serials that are not paired with another write in the same
    /// commit, such as event numbers.
    pub async fn allocate(&self, counter: SerialCounter) -> DbResult<u64> {
        let mut tx = self.store.begin_write().await?;
        let next = self.allocate_in(&mut tx, counter).await?;
        tx.commit().await?;
        Ok(next)
    }
}
