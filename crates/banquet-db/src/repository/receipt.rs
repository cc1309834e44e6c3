//! # Money Receipt Repository
//!
//! The ledger: `moneyReceipts/{month}` documents mapping `slNo -> Payment`.
//! This is the authoritative record; bookings and sub-ledgers mirror it.

use std::collections::BTreeMap;
use tracing::debug;

use banquet_core::calendar::compare_month_keys;
use banquet_core::reconcile::LedgerMonths;
use banquet_core::Payment;

use crate::documents::{collection, DocumentStore, WriteTx};
use crate::error::DbResult;

/// Repository for `moneyReceipts`.
#[derive(Debug, Clone)]
pub struct ReceiptRepository {
    store: DocumentStore,
}

fn with_keys(month: BTreeMap<String, Payment>) -> BTreeMap<String, Payment> {
    month
        .into_iter()
        .map(|(key, mut payment)| {
            if payment.sl_no.is_empty() {
                payment.sl_no = key.clone();
            }
            (key, payment)
        })
        .collect()
}

fn find_in_months(months: LedgerMonths, sl_no: &str) -> Option<(String, Payment)> {
    let mut keys: Vec<&String> = months.keys().collect();
    keys.sort_by(|a, b| compare_month_keys(a, b));
    keys.into_iter()
        .find_map(|month| {
            months[month]
                .get(sl_no)
                .map(|payment| (month.clone(), payment.clone()))
        })
}

impl ReceiptRepository {
    pub fn new(store: DocumentStore) -> Self {
        ReceiptRepository { store }
    }

    /// Entries of one month; empty when the month has none.
    pub async fn month(&self, month: &str) -> DbResult<BTreeMap<String, Payment>> {
        let entries = self
            .store
            .load_entries(collection::MONEY_RECEIPTS, month)
            .await?;
        Ok(with_keys(entries))
    }

    /// Every month document.
    pub async fn all_months(&self) -> DbResult<LedgerMonths> {
        let months = self.store.list_entries(collection::MONEY_RECEIPTS).await?;
        Ok(months.into_iter().map(|(k, m)| (k, with_keys(m))).collect())
    }

    /// Locates a payment by serial, trying `month_hint` before scanning.
    pub async fn find(&self, sl_no: &str, month_hint: Option<&str>) -> DbResult<Option<(String, Payment)>> {
        if let Some(month) = month_hint {
            if let Some(payment) = self.month(month).await?.remove(sl_no) {
                return Ok(Some((month.to_string(), payment)));
            }
        }
        Ok(find_in_months(self.all_months().await?, sl_no))
    }

    pub async fn all_months_in(&self, tx: &mut WriteTx) -> DbResult<LedgerMonths> {
        let months = tx.list_entries(collection::MONEY_RECEIPTS).await?;
        Ok(months.into_iter().map(|(k, m)| (k, with_keys(m))).collect())
    }

    pub async fn month_in(&self, tx: &mut WriteTx, month: &str) -> DbResult<BTreeMap<String, Payment>> {
        let entries = tx.load_entries(collection::MONEY_RECEIPTS, month).await?;
        Ok(with_keys(entries))
    }

    pub async fn find_in(
        &self,
        tx: &mut WriteTx,
        sl_no: &str,
        month_hint: Option<&str>,
    ) -> DbResult<Option<(String, Payment)>> {
        if let Some(month) = month_hint {
            if let Some(payment) = self.month_in(tx, month).await?.remove(sl_no) {
                return Ok(Some((month.to_string(), payment)));
            }
        }
        Ok(find_in_months(self.all_months_in(tx).await?, sl_no))
    }

    /// Merges one payment under its serial. Returns true when it replaced
    /// an existing entry.
    pub async fn upsert_in(&self, tx: &mut WriteTx, month: &str, payment: &Payment) -> DbResult<bool> {
        let replaced = tx
            .merge_entry(collection::MONEY_RECEIPTS, month, &payment.sl_no, payment)
            .await?;
        debug!(sl_no = %payment.sl_no, month = %month, replaced, "Ledger entry written");
        Ok(replaced)
    }

    /// Merges a batch into one month. Returns how many serials were new.
    pub async fn merge_month_in(
        &self,
        tx: &mut WriteTx,
        month: &str,
        entries: &BTreeMap<String, Payment>,
    ) -> DbResult<usize> {
        tx.merge_entries(collection::MONEY_RECEIPTS, month, entries).await
    }

    pub async fn remove_in(&self, tx: &mut WriteTx, month: &str, sl_no: &str) -> DbResult<bool> {
        tx.remove_entry(collection::MONEY_RECEIPTS, month, sl_no).await
    }
}
