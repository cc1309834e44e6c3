//! # Received Money Repository
//!
//! Collection watermarks: `receivedMoney/{payee}` records how much of the
//! payee's credits has already been collected, and `receivedMoney/Money`
//! keeps one running total per target mode.
//!
//! Neither document is derived from the ledger; only Collect changes them.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

use banquet_core::{Money, ReceivedMoney, MODE_TOTALS_DOC};

use crate::documents::{collection, DocumentStore, WriteTx};
use crate::error::DbResult;

/// Repository for `receivedMoney`.
#[derive(Debug, Clone)]
pub struct ReceivedMoneyRepository {
    store: DocumentStore,
}

impl ReceivedMoneyRepository {
    pub fn new(store: DocumentStore) -> Self {
        ReceivedMoneyRepository { store }
    }

    /// Amount already collected from `payee`.
    pub async fn watermark(&self, payee: &str) -> DbResult<Money> {
        let doc: Option<ReceivedMoney> = self.store.load(collection::RECEIVED_MONEY, payee).await?;
        Ok(doc.map(|d| d.total_received).unwrap_or_default())
    }

    /// Every payee watermark.
    pub async fn watermarks(&self) -> DbResult<BTreeMap<String, Money>> {
        let docs: Vec<(String, ReceivedMoney)> = self.store.list(collection::RECEIVED_MONEY).await?;
        Ok(docs
            .into_iter()
            .filter(|(payee, _)| payee != MODE_TOTALS_DOC)
            .map(|(payee, doc)| (payee, doc.total_received))
            .collect())
    }

    /// Running total per target mode.
    pub async fn mode_totals(&self) -> DbResult<BTreeMap<String, Money>> {
        Ok(self
            .store
            .load(collection::RECEIVED_MONEY, MODE_TOTALS_DOC)
            .await?
            .unwrap_or_default())
    }

    pub async fn watermark_in(&self, tx: &mut WriteTx, payee: &str) -> DbResult<Money> {
        let doc: Option<ReceivedMoney> = tx.load(collection::RECEIVED_MONEY, payee).await?;
        Ok(doc.map(|d| d.total_received).unwrap_or_default())
    }

    /// Advances a payee's watermark. Returns the new total.
    pub async fn add_in(
        &self,
        tx: &mut WriteTx,
        payee: &str,
        amount: Money,
        now: DateTime<Utc>,
    ) -> DbResult<Money> {
        let mut doc: ReceivedMoney = tx
            .load(collection::RECEIVED_MONEY, payee)
            .await?
            .unwrap_or_default();
        doc.total_received += amount;
        doc.last_updated = Some(now);
        tx.store(collection::RECEIVED_MONEY, payee, &doc).await?;

        debug!(payee = %payee, total = %doc.total_received, "Watermark advanced");
        Ok(doc.total_received)
    }

    /// Adds to one mode bucket of `receivedMoney/Money`. Returns the new bucket total.
    pub async fn add_mode_in(&self, tx: &mut WriteTx, mode: &str, amount: Money) -> DbResult<Money> {
        let mut totals: BTreeMap<String, Money> = tx
            .load(collection::RECEIVED_MONEY, MODE_TOTALS_DOC)
            .await?
            .unwrap_or_default();
        let bucket = totals.entry(mode.to_string()).or_default();
        *bucket += amount;
        let total = *bucket;
        tx.store(collection::RECEIVED_MONEY, MODE_TOTALS_DOC, &totals).await?;
        Ok(total)
    }
}
