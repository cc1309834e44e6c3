//! # banquet-db: Document Store for Banquet Ledger
//!
//! Persists the booking and ledger documents in SQLite, keeping the
//! collection/document layout the SPA already reads.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Banquet Ledger Data Flow                         │
//! │                                                                         │
//! │  banquet-ledger (record_payment, collect, import, reports)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   banquet-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ receipts      │    │  (embedded)  │  │   │
//! │  │   │               │    │ bookings      │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ counters      │    │ 001_docs.sql │  │   │
//! │  │   │ WriteTx       │    │ accountant    │    │              │  │   │
//! │  │   │ change feed   │    │ outbox ...    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite: documents(collection, doc_id, body) + mirror_outbox           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`documents`] - Document table access and write transactions
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per collection
//!
//! ## Usage
//!
//! ```rust,ignore
//! use banquet_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("ledger.db")).await?;
//! let mut tx = db.begin_write().await?;
//! let next = db.counters().allocate_in(&mut tx, SerialCounter::MoneyReceipt).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod documents;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use documents::{collection, DocumentChange, DocumentStore, WriteTx};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::accountant::AccountantRepository;
pub use repository::booking::BookingRepository;
pub use repository::cancellation::CancellationRepository;
pub use repository::counter::CounterRepository;
pub use repository::outbox::OutboxRepository;
pub use repository::receipt::ReceiptRepository;
pub use repository::received_money::ReceivedMoneyRepository;
pub use repository::reference::{AccessRepository, CatalogRepository};
