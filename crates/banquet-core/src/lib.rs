//! # banquet-core: Pure Business Logic for Banquet Ledger
//!
//! This crate holds the booking estimate math and the ledger bookkeeping
//! rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Banquet Ledger Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 SPA / ledger-cli                                │   │
//! │  │    Estimate form ──► Receipt form ──► Collections ──► Reports   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          banquet-ledger (writer saga, collect, import)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ banquet-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌──────────┐ ┌────────┐ │   │
//! │  │   │  money  │ │ charges │ │ calendar │ │reconcile │ │ serial │ │   │
//! │  │   │  words  │ │ summary │ │  FY, key │ │ balances │ │ C/R/#  │ │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └──────────┘ └────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  banquet-db (Document Store)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Booking, Payment, Transaction and the other stored shapes
//! - [`money`] - Money in integer paise, rupee wire format
//! - [`words`] - Amounts in Indian words
//! - [`charges`] - Booking estimate aggregation
//! - [`calendar`] - Month keys, financial years, import dates
//! - [`serial`] - Receipt counters and serial formatting
//! - [`reconcile`] - Running balances, FY table, payee pending
//! - [`validation`] - Submission checks
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use banquet_core::charges::compute_gst;
//! use banquet_core::words::number_to_indian_words;
//! use banquet_core::Money;
//!
//! let gst = compute_gst(Money::from_rupees(60_000));
//! assert_eq!(gst, Money::from_rupees(10_800));
//! assert_eq!(
//!     number_to_indian_words(gst.rupees() as u64).unwrap(),
//!     "Ten Thousand Eight Hundred only"
//! );
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod calendar;
pub mod charges;
pub mod error;
mod lenient;
pub mod money;
pub mod reconcile;
pub mod serial;
pub mod types;
pub mod validation;
pub mod words;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use calendar::{month_key, FinancialYear, UNKNOWN_MONTH};
pub use charges::{BookingSummary, GrandTotalPolicy};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use reconcile::{ConsistencyReport, LedgerReport, PayeePending};
pub use serial::SerialCounter;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Upper bound for plate counts on one booking.
pub const MAX_PLATES: i64 = 100_000;

/// Longest accepted staff/payee name.
pub const MAX_NAME_LEN: usize = 100;

/// Longest accepted receipt description.
pub const MAX_DESCRIPTION_LEN: usize = 500;
