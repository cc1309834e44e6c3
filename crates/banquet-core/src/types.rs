//! # Domain Types
//!
//! Core domain types used throughout Banquet Ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Booking      │   │    Payment      │   │  Transaction    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  slNo (serial)  │   │  slNo           │       │
//! │  │  sourceDoc      │   │  amount         │   │  amount, type   │       │
//! │  │  selectedMenus  │◄──┤  paymentFor     │──►│  receiver, date │       │
//! │  │  meals          │   │  receiptDate    │   │  (sub-ledger)   │       │
//! │  │  advancePayments│   │  cashTo         │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ AccountantDoc   │   │ ReceivedMoney   │   │   UserAccess    │       │
//! │  │  name, type     │   │  totalReceived  │   │  access, expiry │       │
//! │  │  transactions   │   │  lastUpdated    │   │  editable ids   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Join Key
//! A payment exists up to three times: in its month ledger, in the owning
//! booking (or cancellation record), and in a payee sub-ledger. `slNo` is
//! the key that ties the copies together.
//!
//! JSON field names are camelCase so stored documents keep the shape the
//! SPA already reads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use ts_rs::TS;

use crate::calendar::{month_key, UNKNOWN_MONTH};
use crate::lenient;
use crate::money::Money;

/// Cash that stays in the cash drawer is not mirrored to any sub-ledger.
pub const CASH_IN_HAND: &str = "Cash-Cash";

/// `accountant/` documents that are lists, not payees.
pub const RESERVED_ACCOUNTANT_DOCS: [&str; 3] = ["BankNames", "AssignBank", "AssignLocker"];

/// `receivedMoney/` document holding per-mode totals.
pub const MODE_TOTALS_DOC: &str = "Money";

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so GST at 18% is 1800 bps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

// =============================================================================
// Payment Enums
// =============================================================================

/// Direction of a money movement.
///
/// Stored entries are read leniently: case is ignored, `"Refund"` is a
/// debit, and anything else that is not a credit (including a missing
/// field) counts as money going out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, TS)]
#[ts(export)]
pub enum PaymentFor {
    /// Money received.
    Credit,
    /// Money paid out or refunded.
    #[default]
    Debit,
}

impl PaymentFor {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentFor::Credit => "Credit",
            PaymentFor::Debit => "Debit",
        }
    }

    /// Case-insensitive parse used by the CSV importer; refunds count as debits.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "credit" => Some(PaymentFor::Credit),
            "debit" | "refund" => Some(PaymentFor::Debit),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for PaymentFor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => PaymentFor::parse(&s).unwrap_or_default(),
            _ => PaymentFor::default(),
        })
    }
}

/// Approval state of a ledger entry. Only accepted entries count toward
/// opening balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Approval {
    #[default]
    Accepted,
    Pending,
    Rejected,
}

impl Approval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Approval::Accepted => "Accepted",
            Approval::Pending => "Pending",
            Approval::Rejected => "Rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "accepted" | "" => Some(Approval::Accepted),
            "pending" => Some(Approval::Pending),
            "rejected" => Some(Approval::Rejected),
            _ => None,
        }
    }
}

/// How the money moved. Any name other than the fixed modes is a bank.
///
/// Stored as a plain string (`"Cash"`, `"HDFC Current"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum PaymentMode {
    Cash,
    Card,
    Cheque,
    Bank(String),
    /// Legacy entries without a mode.
    #[default]
    Unspecified,
}

impl PaymentMode {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" => PaymentMode::Unspecified,
            "cash" => PaymentMode::Cash,
            "card" => PaymentMode::Card,
            "cheque" | "check" => PaymentMode::Cheque,
            _ => PaymentMode::Bank(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PaymentMode::Cash => "Cash",
            PaymentMode::Card => "Card",
            PaymentMode::Cheque => "Cheque",
            PaymentMode::Bank(name) => name,
            PaymentMode::Unspecified => "",
        }
    }

    #[inline]
    pub fn is_cash(&self) -> bool {
        matches!(self, PaymentMode::Cash)
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PaymentMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PaymentMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => PaymentMode::parse(&s),
            _ => PaymentMode::Unspecified,
        })
    }
}

// =============================================================================
// Payment
// =============================================================================

/// One money movement, as stored in `moneyReceipts/{month}` and mirrored
/// into the booking and payee sub-ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Serial: bare for bank receipts, `C` for cash, `R` for refunds.
    #[serde(default)]
    pub sl_no: String,

    #[serde(default)]
    pub amount: Money,

    #[serde(default)]
    #[ts(type = "string")]
    pub mode: PaymentMode,

    #[serde(default)]
    pub payment_for: PaymentFor,

    /// Date the money moved; decides the month partition.
    #[serde(
        default,
        deserialize_with = "lenient::date",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(as = "Option<String>")]
    pub receipt_date: Option<NaiveDate>,

    /// Original cell text for imported rows whose date could not be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_receipt_date: Option<String>,

    /// Staff member who logged the receipt.
    #[serde(default)]
    pub receiver: String,

    /// Payee that absorbs cash receipts (bank or locker sub-ledger).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_to: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub approval: Approval,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,

    /// Month partition of the owning booking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_doc: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_name: Option<String>,
}

impl Payment {
    /// Amount signed by direction: credits positive, debits negative.
    pub fn signed_amount(&self) -> Money {
        match self.payment_for {
            PaymentFor::Credit => self.amount,
            PaymentFor::Debit => -self.amount,
        }
    }

    #[inline]
    pub fn is_accepted(&self) -> bool {
        self.approval == Approval::Accepted
    }

    #[inline]
    pub fn is_credit(&self) -> bool {
        self.payment_for == PaymentFor::Credit
    }

    /// Ledger partition this payment belongs in.
    pub fn month_key(&self) -> String {
        self.receipt_date
            .map(month_key)
            .unwrap_or_else(|| UNKNOWN_MONTH.to_string())
    }

    /// Name whose pending balance this payment moves.
    ///
    /// Credits belong to the receiver (or `myName`); debits to the sender,
    /// then `partyName`, then the receiver.
    pub fn counterparty(&self) -> Option<&str> {
        let candidates: [Option<&str>; 3] = match self.payment_for {
            PaymentFor::Credit => [Some(self.receiver.as_str()), self.my_name.as_deref(), None],
            PaymentFor::Debit => [
                self.sender.as_deref(),
                self.party_name.as_deref(),
                Some(self.receiver.as_str()),
            ],
        };
        candidates
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
    }

    /// Payee sub-ledger that mirrors this payment, if any.
    pub fn sub_ledger_payee(&self) -> Option<&str> {
        if !self.mode.is_cash() {
            return None;
        }
        self.cash_to
            .as_deref()
            .map(str::trim)
            .filter(|payee| !payee.is_empty() && *payee != CASH_IN_HAND)
    }
}

// =============================================================================
// Transaction (payee sub-ledger)
// =============================================================================

/// A payment as duplicated into `accountant/{payee}.transactions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default)]
    pub sl_no: String,

    #[serde(default)]
    pub amount: Money,

    #[serde(rename = "type", default)]
    pub kind: PaymentFor,

    #[serde(default)]
    pub receiver: String,

    #[serde(default, deserialize_with = "lenient::date")]
    #[ts(as = "Option<String>")]
    pub date: Option<NaiveDate>,

    #[serde(default)]
    pub description: String,
}

impl From<&Payment> for Transaction {
    fn from(payment: &Payment) -> Self {
        Transaction {
            sl_no: payment.sl_no.clone(),
            amount: payment.amount,
            kind: payment.payment_for,
            receiver: payment.receiver.clone(),
            date: payment.receipt_date,
            description: payment.description.clone(),
        }
    }
}

/// Sub-ledger type, inferred from the payee name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PayeeKind {
    #[default]
    Bank,
    Locker,
}

impl PayeeKind {
    /// `"Main-Locker"` is a locker; every other payee is a bank.
    pub fn infer(payee: &str) -> Self {
        if payee.contains("Locker") {
            PayeeKind::Locker
        } else {
            PayeeKind::Bank
        }
    }
}

/// `accountant/{payee}` document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AccountantDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sl_no: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(rename = "type", default)]
    pub kind: PayeeKind,

    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl AccountantDoc {
    /// Fresh sub-ledger for a payee seen for the first time.
    pub fn for_payee(payee: &str) -> Self {
        AccountantDoc {
            sl_no: None,
            name: payee.to_string(),
            email: None,
            kind: PayeeKind::infer(payee),
            transactions: Vec::new(),
        }
    }

    /// Inserts or replaces the transaction with the same serial.
    /// Returns true when an existing entry was replaced.
    pub fn upsert_transaction(&mut self, transaction: Transaction) -> bool {
        match self
            .transactions
            .iter_mut()
            .find(|t| t.sl_no == transaction.sl_no)
        {
            Some(existing) => {
                *existing = transaction;
                true
            }
            None => {
                self.transactions.push(transaction);
                false
            }
        }
    }

    pub fn remove_transaction(&mut self, sl_no: &str) -> Option<Transaction> {
        let index = self.transactions.iter().position(|t| t.sl_no == sl_no)?;
        Some(self.transactions.remove(index))
    }
}

/// `accountant/BankNames` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BankNames {
    #[serde(default)]
    pub banks: Vec<String>,
}

/// `receivedMoney/{payee}`: how much of the payee's credits has been collected.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedMoney {
    #[serde(default)]
    pub total_received: Money,

    #[serde(
        default,
        deserialize_with = "lenient::timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(as = "Option<String>")]
    pub last_updated: Option<DateTime<Utc>>,
}

// =============================================================================
// Booking
// =============================================================================

/// A chosen menu sub-item or catalog item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MenuSubItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "visible_by_default", deserialize_with = "lenient::flag")]
    pub visibility: bool,
}

fn visible_by_default() -> bool {
    true
}

/// One selected menu category on a booking.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SelectedMenu {
    #[serde(default)]
    pub rate: Money,

    #[serde(default, deserialize_with = "lenient::count")]
    #[ts(type = "number")]
    pub no_of_plates: i64,

    #[serde(default, deserialize_with = "lenient::count")]
    #[ts(type = "number")]
    pub extra_plates: i64,

    /// `rate * (noOfPlates + extraPlates)`, cached at save time.
    #[serde(default)]
    pub total: Money,

    /// Chosen items per sub-category.
    #[serde(default)]
    pub items: BTreeMap<String, Vec<MenuSubItem>>,
}

/// Ad-hoc charge line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomItem {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::count")]
    #[ts(type = "number")]
    pub qty: i64,
    #[serde(default)]
    pub rate: Money,
    #[serde(default)]
    pub total: Money,
}

/// Named charge block with its own quantity and rate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomMenuCharge {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::count")]
    #[ts(type = "number")]
    pub qty: i64,
    #[serde(default)]
    pub rate: Money,
    #[serde(default)]
    pub total: Money,
}

/// One meal slot (Breakfast, Lunch, Hi-Tea, ...) on one day.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MealSlot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,

    #[serde(default, deserialize_with = "lenient::count")]
    #[ts(type = "number")]
    pub pax: i64,

    #[serde(default)]
    pub rate: Money,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,

    /// Explicit total; zero means "use pax * rate".
    #[serde(default)]
    pub total: Money,

    #[serde(default)]
    pub items: Vec<MenuSubItem>,
}

/// A meal map value: a slot object, or anything else the SPA left behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(untagged)]
pub enum MealEntry {
    Slot(MealSlot),
    Other(#[ts(type = "unknown")] Value),
}

/// Day label → slot name → entry.
pub type Meals = BTreeMap<String, BTreeMap<String, MealEntry>>;

/// One customer event estimate, stored in `prebookings/{sourceDoc}` under its id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", default)]
pub struct Booking {
    pub id: String,

    /// Month partition the booking lives under, e.g. `"Sep2025"`.
    pub source_doc: String,

    pub customer_name: String,
    pub contact_no: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    #[serde(deserialize_with = "lenient::date", skip_serializing_if = "Option::is_none")]
    #[ts(as = "Option<String>")]
    pub event_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hall: Option<String>,

    #[serde(deserialize_with = "lenient::count")]
    #[ts(type = "number")]
    pub no_of_plates: i64,
    #[serde(deserialize_with = "lenient::count")]
    #[ts(type = "number")]
    pub extra_plates: i64,
    pub hall_charges: Money,

    pub selected_menus: BTreeMap<String, SelectedMenu>,
    pub custom_items: Vec<CustomItem>,
    pub custom_menu_charges: Vec<CustomMenuCharge>,
    pub meals: Meals,
    pub booking_amenities: BTreeSet<String>,
    pub advance_payments: Vec<Payment>,

    // Cached at save time, not re-derived on read.
    pub total_amount: Money,
    pub gst_base: Money,
    pub gst_amount: Money,
    pub grand_total: Money,
    pub discount: Money,
    pub commission: Money,

    /// Fields this engine does not interpret, kept so saves do not drop them.
    #[serde(flatten)]
    #[ts(skip)]
    pub extra: BTreeMap<String, Value>,
}

impl Booking {
    /// Inserts or replaces the advance payment with the same serial.
    /// Returns true when an existing entry was replaced.
    pub fn upsert_advance(&mut self, payment: Payment) -> bool {
        upsert_by_serial(&mut self.advance_payments, payment)
    }

    pub fn find_advance(&self, sl_no: &str) -> Option<&Payment> {
        self.advance_payments.iter().find(|p| p.sl_no == sl_no)
    }

    /// Sum of credit advances.
    pub fn total_paid(&self) -> Money {
        self.advance_payments
            .iter()
            .filter(|p| p.is_credit())
            .map(|p| p.amount)
            .sum()
    }
}

/// `cancelledBookings/{bookingId}`: the booking fields plus its refunds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CancelledBooking {
    #[serde(flatten)]
    pub booking: Booking,

    #[serde(default)]
    pub refund_payments: Vec<Payment>,
}

impl CancelledBooking {
    pub fn upsert_refund(&mut self, payment: Payment) -> bool {
        upsert_by_serial(&mut self.refund_payments, payment)
    }

    pub fn total_refunded(&self) -> Money {
        self.refund_payments.iter().map(|p| p.amount).sum()
    }
}

fn upsert_by_serial(payments: &mut Vec<Payment>, payment: Payment) -> bool {
    match payments.iter_mut().find(|p| p.sl_no == payment.sl_no) {
        Some(existing) => {
            *existing = payment;
            true
        }
        None => {
            payments.push(payment);
            false
        }
    }
}

// =============================================================================
// Reference Data (read-only here)
// =============================================================================

/// Menu sub-category: the items a customer can pick from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubCategory {
    #[serde(default)]
    pub menu_items: Vec<MenuSubItem>,
}

/// One menu category: a per-plate price plus any number of sub-categories.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MenuCategory {
    #[serde(default)]
    pub price: Money,

    #[serde(flatten)]
    pub rest: BTreeMap<String, Value>,
}

impl MenuCategory {
    /// Sub-categories that parse; other keys are ignored.
    pub fn sub_categories(&self) -> BTreeMap<String, SubCategory> {
        self.rest
            .iter()
            .filter_map(|(name, value)| {
                serde_json::from_value::<SubCategory>(value.clone())
                    .ok()
                    .filter(|sub| !sub.menu_items.is_empty())
                    .map(|sub| (name.clone(), sub))
            })
            .collect()
    }
}

/// `menu/{mealPeriod}` catalog.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MenuCatalog {
    #[serde(default)]
    pub categories: BTreeMap<String, MenuCategory>,
}

impl MenuCatalog {
    /// Per-plate price that seeds a newly selected menu's rate.
    pub fn category_price(&self, category: &str) -> Option<Money> {
        self.categories.get(category).map(|c| c.price)
    }

    /// Starts a selected-menu row for a category at its catalog price.
    pub fn select(&self, category: &str, no_of_plates: i64, extra_plates: i64) -> Option<SelectedMenu> {
        let rate = self.category_price(category)?;
        Some(SelectedMenu {
            rate,
            no_of_plates,
            extra_plates,
            total: rate * (no_of_plates + extra_plates),
            items: BTreeMap::new(),
        })
    }
}

/// Whether a staff account may use the app at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum AccessState {
    Enable,
    #[default]
    Disable,
}

/// `usersAccess/{email}` record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", default)]
pub struct UserAccess {
    pub name: String,
    pub email: String,
    pub access_to_app: String,
    pub access: AccessState,
    pub editable_prebookings: Vec<String>,
    #[serde(deserialize_with = "lenient::flag")]
    pub edit_data: bool,
    #[serde(deserialize_with = "lenient::timestamp", skip_serializing_if = "Option::is_none")]
    #[ts(as = "Option<String>")]
    pub edit_expiry: Option<DateTime<Utc>>,
}

impl UserAccess {
    /// True when the account is enabled and either the booking was granted
    /// explicitly or a general edit window is still open at `now`.
    pub fn can_edit_booking(&self, booking_id: &str, now: DateTime<Utc>) -> bool {
        if self.access != AccessState::Enable {
            return false;
        }
        if self.editable_prebookings.iter().any(|id| id == booking_id) {
            return true;
        }
        self.edit_data && self.edit_expiry.is_some_and(|expiry| expiry > now)
    }
}

// =============================================================================
// Mirror Outbox
// =============================================================================

/// Which secondary copy of a payment a mirror task maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MirrorKind {
    BookingAdvance,
    RefundRecord,
    PayeeSubLedger,
}

impl MirrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorKind::BookingAdvance => "booking_advance",
            MirrorKind::RefundRecord => "refund_record",
            MirrorKind::PayeeSubLedger => "payee_sub_ledger",
        }
    }
}

/// A pending projection of a ledger entry into another document.
///
/// Applying the same target twice leaves the same result: every target
/// replaces the element with the matching `slNo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MirrorTarget {
    BookingAdvance {
        source_doc: String,
        booking_id: String,
        payment: Payment,
    },
    RefundRecord {
        booking_id: String,
        payment: Payment,
    },
    PayeeSubLedger {
        payee: String,
        transaction: Transaction,
    },
}

impl MirrorTarget {
    pub fn kind(&self) -> MirrorKind {
        match self {
            MirrorTarget::BookingAdvance { .. } => MirrorKind::BookingAdvance,
            MirrorTarget::RefundRecord { .. } => MirrorKind::RefundRecord,
            MirrorTarget::PayeeSubLedger { .. } => MirrorKind::PayeeSubLedger,
        }
    }

    pub fn sl_no(&self) -> &str {
        match self {
            MirrorTarget::BookingAdvance { payment, .. } => &payment.sl_no,
            MirrorTarget::RefundRecord { payment, .. } => &payment.sl_no,
            MirrorTarget::PayeeSubLedger { transaction, .. } => &transaction.sl_no,
        }
    }
}

/// A row of the mirror outbox.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MirrorOutboxEntry {
    pub id: String,
    pub sl_no: String,
    pub kind: MirrorKind,
    /// The serialized [`MirrorTarget`].
    pub payload: String,
    #[ts(type = "number")]
    pub attempts: i64,
    pub last_error: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub attempted_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub applied_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================
