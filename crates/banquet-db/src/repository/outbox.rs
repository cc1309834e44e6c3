//! # Mirror Outbox Repository
//!
//! Queue of pending projections of ledger entries into their secondary
//! copies (booking advances, refund records, payee sub-ledgers).
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Record Payment                                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │  1. settings/slCounter      cashMoneyReceipt = 87               │   │
//! │  │  2. moneyReceipts/Sep2025   "C87" = {Payment}                   │   │
//! │  │  3. mirror_outbox           booking_advance  C87                │   │
//! │  │                             payee_sub_ledger C87                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │ COMMIT                                                          │
//! │       ▼                                                                 │
//! │  For each outbox row (own transaction per row):                        │
//! │     apply mirror + mark applied      ── success                        │
//! │     attempts += 1, last_error = ?    ── failure, retried later         │
//! │                                                                         │
//! │  KEY GUARANTEES:                                                       │
//! │  • The ledger entry never exists without its mirror rows               │
//! │  • Mirrors replace by slNo, so re-applying is harmless                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use banquet_core::{MirrorKind, MirrorOutboxEntry, MirrorTarget};

use crate::documents::{DocumentStore, WriteTx};
use crate::error::{DbError, DbResult};

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DbError::Internal(format!("bad outbox timestamp '{value}': {e}")))
}

fn parse_kind(value: &str) -> DbResult<MirrorKind> {
    match value {
        "booking_advance" => Ok(MirrorKind::BookingAdvance),
        "refund_record" => Ok(MirrorKind::RefundRecord),
        "payee_sub_ledger" => Ok(MirrorKind::PayeeSubLedger),
        other => Err(DbError::Internal(format!("unknown mirror kind '{other}'"))),
    }
}

#[derive(Debug, FromRow)]
struct OutboxRow {
    id: String,
    sl_no: String,
    kind: String,
    payload: String,
    attempts: i64,
    last_error: Option<String>,
    created_at: String,
    attempted_at: Option<String>,
    applied_at: Option<String>,
}

impl TryFrom<OutboxRow> for MirrorOutboxEntry {
    type Error = DbError;

    fn try_from(row: OutboxRow) -> DbResult<Self> {
        Ok(MirrorOutboxEntry {
            kind: parse_kind(&row.kind)?,
            created_at: parse_timestamp(&row.created_at)?,
            attempted_at: row.attempted_at.as_deref().map(parse_timestamp).transpose()?,
            applied_at: row.applied_at.as_deref().map(parse_timestamp).transpose()?,
            id: row.id,
            sl_no: row.sl_no,
            payload: row.payload,
            attempts: row.attempts,
            last_error: row.last_error,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, sl_no, kind, payload, attempts, last_error, \
                              created_at, attempted_at, applied_at FROM mirror_outbox";

/// Repository for the `mirror_outbox` table.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    store: DocumentStore,
}

impl OutboxRepository {
    pub fn new(store: DocumentStore) -> Self {
        OutboxRepository { store }
    }

    /// Queues a mirror inside the transaction that wrote the ledger entry.
    ///
    /// Older pending rows for the same serial and kind are closed as
    /// superseded so a retry cannot overwrite a newer copy.
    pub async fn enqueue_in(&self, tx: &mut WriteTx, target: &MirrorTarget) -> DbResult<MirrorOutboxEntry> {
        let now = Utc::now();
        let kind = target.kind();

        sqlx::query(
            r#"
            UPDATE mirror_outbox SET
                applied_at = ?3,
                last_error = 'superseded'
            WHERE sl_no = ?1 AND kind = ?2 AND applied_at IS NULL
            "#,
        )
        .bind(target.sl_no())
        .bind(kind.as_str())
        .bind(timestamp(now))
        .execute(tx.conn())
        .await?;

        let entry = MirrorOutboxEntry {
            id: Uuid::new_v4().to_string(),
            sl_no: target.sl_no().to_string(),
            kind,
            payload: serde_json::to_string(target)?,
            attempts: 0,
            last_error: None,
            created_at: now,
            attempted_at: None,
            applied_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO mirror_outbox (
                id, sl_no, kind, payload, attempts, last_error,
                created_at, attempted_at, applied_at
            ) VALUES (?1, ?2, ?3, ?4, 0, NULL, ?5, NULL, NULL)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.sl_no)
        .bind(kind.as_str())
        .bind(&entry.payload)
        .bind(timestamp(now))
        .execute(tx.conn())
        .await?;

        debug!(sl_no = %entry.sl_no, kind = kind.as_str(), "Mirror queued");
        Ok(entry)
    }

    /// Closes every pending row for a serial. Used when an edit rewrites the
    /// copies directly. Returns the number of rows closed.
    pub async fn supersede_in(&self, tx: &mut WriteTx, sl_no: &str) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE mirror_outbox SET
                applied_at = ?2,
                last_error = 'superseded'
            WHERE sl_no = ?1 AND applied_at IS NULL
            "#,
        )
        .bind(sl_no)
        .bind(timestamp(Utc::now()))
        .execute(tx.conn())
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<MirrorOutboxEntry>> {
        let row: Option<OutboxRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(self.store.pool())
            .await?;
        row.map(MirrorOutboxEntry::try_from).transpose()
    }

    /// Unapplied rows with fewer than `max_attempts` attempts, oldest first.
    pub async fn pending(&self, limit: u32, max_attempts: u32) -> DbResult<Vec<MirrorOutboxEntry>> {
        let rows: Vec<OutboxRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE applied_at IS NULL AND attempts < ?1 \
             ORDER BY created_at ASC LIMIT ?2"
        ))
        .bind(i64::from(max_attempts))
        .bind(i64::from(limit))
        .fetch_all(self.store.pool())
        .await?;
        rows.into_iter().map(MirrorOutboxEntry::try_from).collect()
    }

    /// Unapplied rows that have used up their attempts.
    pub async fn exhausted(&self, max_attempts: u32) -> DbResult<Vec<MirrorOutboxEntry>> {
        let rows: Vec<OutboxRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE applied_at IS NULL AND attempts >= ?1 ORDER BY created_at ASC"
        ))
        .bind(i64::from(max_attempts))
        .fetch_all(self.store.pool())
        .await?;
        rows.into_iter().map(MirrorOutboxEntry::try_from).collect()
    }

    /// Marks a row applied, in the transaction that applied the mirror.
    pub async fn mark_applied_in(&self, tx: &mut WriteTx, id: &str) -> DbResult<()> {
        let now = timestamp(Utc::now());
        sqlx::query(
            r#"
            UPDATE mirror_outbox SET
                applied_at = ?2,
                attempted_at = ?2,
                attempts = attempts + 1
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(tx.conn())
        .await?;
        Ok(())
    }

    /// Records a failed attempt.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE mirror_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(timestamp(Utc::now()))
        .execute(self.store.pool())
        .await?;
        Ok(())
    }

    /// Counts unapplied rows.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mirror_outbox WHERE applied_at IS NULL")
            .fetch_one(self.store.pool())
            .await?;
        Ok(count)
    }

    /// Deletes rows applied more than `days_old` days ago. Returns the count.
    pub async fn cleanup_applied(&self, days_old: u32) -> DbResult<u64> {
        let cutoff = timestamp(Utc::now() - Duration::days(i64::from(days_old)));
        let result = sqlx::query("DELETE FROM mirror_outbox WHERE applied_at IS NOT NULL AND applied_at < ?1")
            .bind(cutoff)
            .execute(self.store.pool())
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use banquet_core::{Money, PaymentFor, Transaction};

    fn target(sl_no: &str, payee: &str) -> MirrorTarget {
        MirrorTarget::PayeeSubLedger {
            payee: payee.to_string(),
            transaction: Transaction {
                sl_no: sl_no.to_string(),
                amount: Money::from_rupees(100),
                kind: PaymentFor::Credit,
                receiver: "Ravi".to_string(),
                date: None,
                description: String::new(),
            },
        }
    }

    #[tokio::test]
    async fn test_enqueue_and_apply() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let outbox = db.outbox();

        let mut tx = db.begin_write().await.unwrap();
        let entry = outbox.enqueue_in(&mut tx, &target("C1", "Main-Locker")).await.unwrap();
        tx.commit().await.unwrap();

        let pending = outbox.pending(10, 5).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, MirrorKind::PayeeSubLedger);
        let decoded: MirrorTarget = serde_json::from_str(&pending[0].payload).unwrap();
        assert_eq!(decoded, target("C1", "Main-Locker"));

        let mut tx = db.begin_write().await.unwrap();
        outbox.mark_applied_in(&mut tx, &entry.id).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outbox.count_pending().await.unwrap(), 0);
        assert!(outbox.get(&entry.id).await.unwrap().unwrap().applied_at.is_some());
    }

    #[tokio::test]
    async fn test_failures_exhaust_attempts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let outbox = db.outbox();

        let mut tx = db.begin_write().await.unwrap();
        let entry = outbox.enqueue_in(&mut tx, &target("C1", "Main-Locker")).await.unwrap();
        tx.commit().await.unwrap();

        outbox.mark_failed(&entry.id, "booking not found").await.unwrap();
        outbox.mark_failed(&entry.id, "booking not found").await.unwrap();

        assert!(outbox.pending(10, 2).await.unwrap().is_empty());
        let exhausted = outbox.exhausted(2).await.unwrap();
        assert_eq!(exhausted.len(), 1);
        assert_eq!(exhausted[0].attempts, 2);
        assert_eq!(exhausted[0].last_error.as_deref(), Some("booking not found"));
    }

    #[tokio::test]
    async fn test_newer_mirror_supersedes_older() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let outbox = db.outbox();

        let mut tx = db.begin_write().await.unwrap();
        let old = outbox.enqueue_in(&mut tx, &target("C1", "Main-Locker")).await.unwrap();
        let new = outbox.enqueue_in(&mut tx, &target("C1", "Abhishek-Bank")).await.unwrap();
        tx.commit().await.unwrap();

        let pending = outbox.pending(10, 5).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, new.id);
        let closed = outbox.get(&old.id).await.unwrap().unwrap();
        assert_eq!(closed.last_error.as_deref(), Some("superseded"));
    }

    #[tokio::test]
    async fn test_supersede_closes_all_kinds() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let outbox = db.outbox();

        let mut tx = db.begin_write().await.unwrap();
        outbox.enqueue_in(&mut tx, &target("C1", "Main-Locker")).await.unwrap();
        outbox.enqueue_in(&mut tx, &target("C2", "Main-Locker")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = db.begin_write().await.unwrap();
        assert_eq!(outbox.supersede_in(&mut tx, "C1").await.unwrap(), 1);
        tx.commit().await.unwrap();

        let pending = outbox.pending(10, 5).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].sl_no, "C2");
    }
}
