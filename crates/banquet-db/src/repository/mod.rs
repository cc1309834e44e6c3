//! # Repository Module
//!
//! One repository per document collection.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LedgerWriter::record_payment                                          │
//! │       │                                                                 │
//! │       │  let mut tx = db.begin_write().await?;                         │
//! │       │  db.counters().allocate_in(&mut tx, counter)                   │
//! │       │  db.receipts().upsert_in(&mut tx, month, &payment)             │
//! │       │  db.outbox().enqueue_in(&mut tx, &mirror)                      │
//! │       │  tx.commit()                                                   │
//! │       ▼                                                                 │
//! │  Repositories                                                          │
//! │  ├── `xxx(..)`        reads through the pool                           │
//! │  └── `xxx_in(tx, ..)` reads and writes inside a WriteTx                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  documents table (SQLite)                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CounterRepository`](counter::CounterRepository) - `settings/slCounter`
//! - [`ReceiptRepository`](receipt::ReceiptRepository) - `moneyReceipts`
//! - [`BookingRepository`](booking::BookingRepository) - `prebookings`
//! - [`CancellationRepository`](cancellation::CancellationRepository) - `cancelledBookings`
//! - [`AccountantRepository`](accountant::AccountantRepository) - `accountant`
//! - [`ReceivedMoneyRepository`](received_money::ReceivedMoneyRepository) - `receivedMoney`
//! - [`CatalogRepository`](reference::CatalogRepository), [`AccessRepository`](reference::AccessRepository) - `menu`, `usersAccess`
//! - [`OutboxRepository`](outbox::OutboxRepository) - mirror queue

pub mod accountant;
pub mod booking;
pub mod cancellation;
pub mod counter;
pub mod outbox;
pub mod receipt;
pub mod received_money;
pub mod reference;
