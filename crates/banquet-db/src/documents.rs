//! # Document Store
//!
//! The booking and ledger data keep the shape of a document database:
//! named collections of JSON documents addressed by id. This module maps
//! that shape onto one SQLite table and provides the write transaction every
//! repository writes through.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  documents                                                              │
//! │  ┌──────────────────┬──────────────┬──────────────────────────────────┐│
//! │  │ collection       │ doc_id       │ body (JSON)                      ││
//! │  ├──────────────────┼──────────────┼──────────────────────────────────┤│
//! │  │ moneyReceipts    │ Sep2025      │ { "C12": {Payment}, ... }        ││
//! │  │ prebookings      │ Sep2025      │ { "<bookingId>": {Booking}, ... }││
//! │  │ cancelledBookings│ <bookingId>  │ { ...Booking, refundPayments }   ││
//! │  │ accountant       │ Main-Locker  │ { name, type, transactions }     ││
//! │  │ settings         │ slCounter    │ { moneyReceipt: 412, ... }       ││
//! │  │ receivedMoney    │ Ravi / Money │ { totalReceived } / {mode: amt}  ││
//! │  └──────────────────┴──────────────┴──────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Transactions
//! ```text
//! begin_write()
//!   │  BEGIN; UPDATE write_guard ...   ← takes the write lock up front
//!   ▼
//! load / store / merge_entry ...       ← all through the same connection
//!   │
//!   ▼
//! commit()                             ← then one DocumentChange per touched doc
//! ```
//!
//! Taking the lock before the first read is what makes read-increment-write
//! of a counter atomic: a second writer waits at `begin_write` instead of
//! reading the same value.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{Sqlite, SqliteConnection, SqliteExecutor, SqlitePool, Transaction};
use std::collections::BTreeMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

// =============================================================================
// Collections
// =============================================================================

/// Collection names. These are the persisted key names and must not change.
pub mod collection {
    pub const PREBOOKINGS: &str = "prebookings";
    pub const MONEY_RECEIPTS: &str = "moneyReceipts";
    pub const CANCELLED_BOOKINGS: &str = "cancelledBookings";
    pub const ACCOUNTANT: &str = "accountant";
    pub const SETTINGS: &str = "settings";
    pub const RECEIVED_MONEY: &str = "receivedMoney";
    pub const USERS_ACCESS: &str = "usersAccess";
    pub const MENU: &str = "menu";
}

/// A committed change to one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChange {
    pub collection: String,
    pub doc_id: String,
}

impl DocumentChange {
    pub fn new(collection: &str, doc_id: &str) -> Self {
        DocumentChange {
            collection: collection.to_string(),
            doc_id: doc_id.to_string(),
        }
    }
}

// =============================================================================
// Raw Access
// =============================================================================

async fn fetch_body<'e, E: SqliteExecutor<'e>>(
    executor: E,
    collection: &str,
    doc_id: &str,
) -> DbResult<Option<String>> {
    let body: Option<String> =
        sqlx::query_scalar("SELECT body FROM documents WHERE collection = ?1 AND doc_id = ?2")
            .bind(collection)
            .bind(doc_id)
            .fetch_optional(executor)
            .await?;
    Ok(body)
}

async fn fetch_collection<'e, E: SqliteExecutor<'e>>(
    executor: E,
    collection: &str,
) -> DbResult<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT doc_id, body FROM documents WHERE collection = ?1 ORDER BY doc_id",
    )
    .bind(collection)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

fn decode<T: DeserializeOwned>(collection: &str, doc_id: &str, body: &str) -> DbResult<T> {
    serde_json::from_str(body).map_err(|e| DbError::invalid_document(collection, doc_id, e))
}

/// Decodes a map-shaped document entry by entry.
///
/// Entries that do not parse are skipped with a warning so one bad row
/// does not hide a whole month.
fn decode_entries<T: DeserializeOwned>(
    collection: &str,
    doc_id: &str,
    body: &str,
) -> DbResult<BTreeMap<String, T>> {
    let raw: Map<String, Value> = decode(collection, doc_id, body)?;
    let mut entries = BTreeMap::new();
    for (key, value) in raw {
        match serde_json::from_value::<T>(value) {
            Ok(entry) => {
                entries.insert(key, entry);
            }
            Err(e) => warn!(
                collection = %collection,
                doc_id = %doc_id,
                key = %key,
                error = %e,
                "Skipping unreadable document entry"
            ),
        }
    }
    Ok(entries)
}

/// Loads and decodes one document.
pub async fn load<'e, T, E>(executor: E, collection: &str, doc_id: &str) -> DbResult<Option<T>>
where
    T: DeserializeOwned,
    E: SqliteExecutor<'e>,
{
    match fetch_body(executor, collection, doc_id).await? {
        Some(body) => decode(collection, doc_id, &body).map(Some),
        None => Ok(None),
    }
}

/// Loads a map-shaped document (`key -> entry`); missing documents are empty.
pub async fn load_entries<'e, T, E>(
    executor: E,
    collection: &str,
    doc_id: &str,
) -> DbResult<BTreeMap<String, T>>
where
    T: DeserializeOwned,
    E: SqliteExecutor<'e>,
{
    match fetch_body(executor, collection, doc_id).await? {
        Some(body) => decode_entries(collection, doc_id, &body),
        None => Ok(BTreeMap::new()),
    }
}

/// Loads every document of a collection, ordered by id.
///
/// Documents that fail to decode are skipped with a warning.
pub async fn list<'e, T, E>(executor: E, collection: &str) -> DbResult<Vec<(String, T)>>
where
    T: DeserializeOwned,
    E: SqliteExecutor<'e>,
{
    let rows = fetch_collection(executor, collection).await?;
    let mut docs = Vec::with_capacity(rows.len());
    for (doc_id, body) in rows {
        match decode::<T>(collection, &doc_id, &body) {
            Ok(doc) => docs.push((doc_id, doc)),
            Err(e) => warn!(collection = %collection, doc_id = %doc_id, error = %e, "Skipping unreadable document"),
        }
    }
    Ok(docs)
}

/// Loads every map-shaped document of a collection.
pub async fn list_entries<'e, T, E>(
    executor: E,
    collection: &str,
) -> DbResult<BTreeMap<String, BTreeMap<String, T>>>
where
    T: DeserializeOwned,
    E: SqliteExecutor<'e>,
{
    let rows = fetch_collection(executor, collection).await?;
    let mut docs = BTreeMap::new();
    for (doc_id, body) in rows {
        match decode_entries::<T>(collection, &doc_id, &body) {
            Ok(entries) => {
                docs.insert(doc_id, entries);
            }
            Err(e) => warn!(collection = %collection, doc_id = %doc_id, error = %e, "Skipping unreadable document"),
        }
    }
    Ok(docs)
}

// =============================================================================
// Write Transaction
// =============================================================================

/// An open write transaction.
///
/// Every document write goes through one of these. Changes are published to
/// subscribers only after [`WriteTx::commit`] succeeds; dropping the value
/// without committing rolls everything back.
///
/// While a `WriteTx` is open, read through it rather than through the pool:
/// an in-memory database has a single connection and this transaction holds it.
pub struct WriteTx {
    tx: Transaction<'static, Sqlite>,
    changes: Vec<DocumentChange>,
    notifier: broadcast::Sender<DocumentChange>,
}

impl std::fmt::Debug for WriteTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTx")
            .field("changes", &self.changes)
            .finish_non_exhaustive()
    }
}

impl WriteTx {
    pub(crate) async fn begin(
        pool: &SqlitePool,
        notifier: broadcast::Sender<DocumentChange>,
    ) -> DbResult<Self> {
        let mut tx = pool.begin().await?;
        sqlx::query("UPDATE write_guard SET generation = generation + 1 WHERE id = 1")
            .execute(&mut *tx)
            .await?;
        Ok(WriteTx {
            tx,
            changes: Vec::new(),
            notifier,
        })
    }

    /// The transaction's connection, for queries outside the document table.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    pub async fn load<T: DeserializeOwned>(
        &mut self,
        collection: &str,
        doc_id: &str,
    ) -> DbResult<Option<T>> {
        load(&mut *self.tx, collection, doc_id).await
    }

    pub async fn load_entries<T: DeserializeOwned>(
        &mut self,
        collection: &str,
        doc_id: &str,
    ) -> DbResult<BTreeMap<String, T>> {
        load_entries(&mut *self.tx, collection, doc_id).await
    }

    pub async fn list<T: DeserializeOwned>(&mut self, collection: &str) -> DbResult<Vec<(String, T)>> {
        list(&mut *self.tx, collection).await
    }

    pub async fn list_entries<T: DeserializeOwned>(
        &mut self,
        collection: &str,
    ) -> DbResult<BTreeMap<String, BTreeMap<String, T>>> {
        list_entries(&mut *self.tx, collection).await
    }

    /// Writes a whole document, replacing any previous body.
    pub async fn store<T: Serialize>(
        &mut self,
        collection: &str,
        doc_id: &str,
        document: &T,
    ) -> DbResult<()> {
        let body = serde_json::to_string(document)?;
        sqlx::query(
            r#"
            INSERT INTO documents (collection, doc_id, body, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (collection, doc_id) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(collection)
        .bind(doc_id)
        .bind(&body)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *self.tx)
        .await?;

        debug!(collection = %collection, doc_id = %doc_id, bytes = body.len(), "Stored document");
        self.touch(collection, doc_id);
        Ok(())
    }

    /// Deletes a document. Returns false when it did not exist.
    pub async fn delete(&mut self, collection: &str, doc_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ?1 AND doc_id = ?2")
            .bind(collection)
            .bind(doc_id)
            .execute(&mut *self.tx)
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            debug!(collection = %collection, doc_id = %doc_id, "Deleted document");
            self.touch(collection, doc_id);
        }
        Ok(deleted)
    }

    /// Sets a single key of a map-shaped document, leaving the other keys
    /// untouched. Creates the document when missing.
    ///
    /// Returns true when the key already existed.
    pub async fn merge_entry<T: Serialize>(
        &mut self,
        collection: &str,
        doc_id: &str,
        key: &str,
        entry: &T,
    ) -> DbResult<bool> {
        let mut raw = self.load_raw_map(collection, doc_id).await?;
        let existed = raw
            .insert(key.to_string(), serde_json::to_value(entry)?)
            .is_some();
        self.store(collection, doc_id, &raw).await?;
        Ok(existed)
    }

    /// Merges many keys into a map-shaped document at once.
    ///
    /// Returns how many keys were new to the document.
    pub async fn merge_entries<T: Serialize>(
        &mut self,
        collection: &str,
        doc_id: &str,
        entries: &BTreeMap<String, T>,
    ) -> DbResult<usize> {
        let mut raw = self.load_raw_map(collection, doc_id).await?;
        let mut added = 0;
        for (key, entry) in entries {
            if raw.insert(key.clone(), serde_json::to_value(entry)?).is_none() {
                added += 1;
            }
        }
        self.store(collection, doc_id, &raw).await?;
        Ok(added)
    }

    /// Removes one key from a map-shaped document. Returns false when absent.
    pub async fn remove_entry(&mut self, collection: &str, doc_id: &str, key: &str) -> DbResult<bool> {
        let mut raw = self.load_raw_map(collection, doc_id).await?;
        if raw.remove(key).is_none() {
            return Ok(false);
        }
        self.store(collection, doc_id, &raw).await?;
        Ok(true)
    }

    async fn load_raw_map(&mut self, collection: &str, doc_id: &str) -> DbResult<Map<String, Value>> {
        Ok(self
            .load::<Map<String, Value>>(collection, doc_id)
            .await?
            .unwrap_or_default())
    }

    /// Records a change to publish on commit.
    pub fn touch(&mut self, collection: &str, doc_id: &str) {
        let change = DocumentChange::new(collection, doc_id);
        if !self.changes.contains(&change) {
            self.changes.push(change);
        }
    }

    /// Commits and publishes the touched documents.
    pub async fn commit(self) -> DbResult<Vec<DocumentChange>> {
        let WriteTx {
            tx,
            changes,
            notifier,
        } = self;
        tx.commit()
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::Busy(msg) => DbError::Busy(msg),
                other => DbError::TransactionFailed(other.to_string()),
            })?;

        for change in &changes {
            // No subscribers is fine.
            let _ = notifier.send(change.clone());
        }
        debug!(documents = changes.len(), "Write committed");
        Ok(changes)
    }

    pub async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// =============================================================================
// Store Handle
// =============================================================================

/// Pool plus change feed, shared by every repository.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
    notifier: broadcast::Sender<DocumentChange>,
}

impl DocumentStore {
    pub fn new(pool: SqlitePool, change_capacity: usize) -> Self {
        let (notifier, _) = broadcast::channel(change_capacity.max(1));
        DocumentStore { pool, notifier }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin_write(&self) -> DbResult<WriteTx> {
        WriteTx::begin(&self.pool, self.notifier.clone()).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DocumentChange> {
        self.notifier.subscribe()
    }

    pub async fn load<T: DeserializeOwned>(&self, collection: &str, doc_id: &str) -> DbResult<Option<T>> {
        load(&self.pool, collection, doc_id).await
    }

    pub async fn load_entries<T: DeserializeOwned>(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> DbResult<BTreeMap<String, T>> {
        load_entries(&self.pool, collection, doc_id).await
    }

    pub async fn list<T: DeserializeOwned>(&self, collection: &str) -> DbResult<Vec<(String, T)>> {
        list(&self.pool, collection).await
    }

    pub async fn list_entries<T: DeserializeOwned>(
        &self,
        collection: &str,
    ) -> DbResult<BTreeMap<String, BTreeMap<String, T>>> {
        list_entries(&self.pool, collection).await
    }

    /// Writes one document in its own transaction.
    pub async fn store<T: Serialize>(&self, collection: &str, doc_id: &str, document: &T) -> DbResult<()> {
        let mut tx = self.begin_write().await?;
        tx.store(collection, doc_id, document).await?;
        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
