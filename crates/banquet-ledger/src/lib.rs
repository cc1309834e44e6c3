//! # banquet-ledger: Ledger Protocols for Banquet Ledger
//!
//! Turns submitted forms into consistent documents: one payment lands in
//! the monthly ledger first, then its copies are mirrored into the booking,
//! the cancellation record and the payee sub-ledger.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          LedgerEngine                                   │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │  LedgerWriter   │   │ BookingService  │   │   Collections       │   │
//! │  │                 │   │                 │   │                     │   │
//! │  │ serial alloc    │   │ estimate/save   │   │ pending re-derived  │   │
//! │  │ ledger append   │   │ move / cancel   │   │ in the same tx as   │   │
//! │  │ outbox rows     │   │ can_edit        │   │ the watermark bump  │   │
//! │  └────────┬────────┘   └─────────────────┘   └─────────────────────┘   │
//! │           │ commit                                                      │
//! │           ▼                                                             │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │ MirrorProcessor │   │  LedgerWatch    │   │  LedgerTransfer     │   │
//! │  │                 │   │                 │   │                     │   │
//! │  │ replays queued  │   │ live report on  │   │ CSV export/import   │   │
//! │  │ copies, purges  │   │ every ledger    │   │ idempotent merges   │   │
//! │  │ applied rows    │   │ commit          │   │                     │   │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────────┘   │
//! │                                                                         │
//! │  LedgerReporter: ledger screen, FY table, pending, consistency         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use banquet_ledger::{LedgerConfig, LedgerEngine, PaymentDraft, PaymentTarget};
//!
//! let config = LedgerConfig::load(None)?;
//! let mut engine = LedgerEngine::open(config).await?;
//! engine.start().await?;
//!
//! let outcome = engine
//!     .writer()
//!     .record_payment(draft, PaymentTarget::Standalone)
//!     .await?;
//! println!("Recorded {}", outcome.sl_no());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod bookings;
pub mod collect;
pub mod config;
pub mod engine;
pub mod error;
pub mod mirror;
pub mod reports;
pub mod transfer;
pub mod watch;
pub mod writer;

mod retry;

// =============================================================================
// Re-exports
// =============================================================================

pub use bookings::BookingService;
pub use collect::{CollectOutcome, Collections};
pub use config::{AllocationSettings, DatabaseSettings, EstimateSettings, LedgerConfig, OutboxSettings};
pub use engine::{EngineStatus, LedgerEngine};
pub use error::{LedgerError, LedgerResult};
pub use mirror::{drain_pending, DrainSummary, MirrorProcessor, MirrorProcessorHandle};
pub use reports::LedgerReporter;
pub use transfer::{ImportSummary, LedgerTransfer, PartitionSummary};
pub use watch::{LedgerWatch, LedgerWatchHandle};
pub use writer::{CopyLocation, EditMiss, EditOutcome, LedgerWriter, PaymentChanges, PaymentDraft, PaymentTarget, RecordOutcome};
