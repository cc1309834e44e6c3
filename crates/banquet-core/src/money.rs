//! # Money Module
//!
//! Provides the `Money` type for handling rupee amounts safely.
//!
//! ## Why Integer Paise?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In the browser:                                                        │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Plate totals, GST and running balances are sums of many terms, so     │
//! │  float drift eventually shows up in a reconciled ledger.               │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Paise                                            │
//! │    ₹1,250.50 is stored as 125050 paise                                  │
//! │    Only GST needs rounding, and it is rounded once (half-up)           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Documents written by the SPA carry amounts as rupee numbers, sometimes
//! as strings (`"1,250"`, `"₹ 300"`), sometimes as nothing at all. `Money`
//! serializes back to a rupee number and deserializes leniently: anything
//! that is not a number is coerced to zero instead of failing the document.
//!
//! ## Usage
//! ```rust
//! use banquet_core::money::Money;
//!
//! let rate = Money::from_rupees(450);        // ₹450.00 per plate
//! let total = rate * 120;                    // ₹54,000.00
//! assert_eq!(total.to_string(), "₹54,000.00");
//!
//! let typed = Money::parse_lenient("1,250.5");
//! assert_eq!(typed.paise(), 125050);
//! ```

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

/// GST applied to the taxable base of a booking (18%).
pub const GST_RATE: TaxRate = TaxRate::from_bps(1800);

// =============================================================================
// Money Type
// =============================================================================

/// Represents a rupee amount in paise (1/100 rupee).
///
/// ## User Workflow Context
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                    Where Money is Used                                  │
/// │                                                                         │
/// │  Menu.rate ──► SelectedMenu.total ──┐                                   │
/// │  MealSlot.rate × pax ───────────────┼──► Booking.totalAmount            │
/// │  hallCharges ───────────────────────┘          │                        │
/// │                                          GST (18%) ──► grandTotal       │
/// │                                                                         │
/// │  Payment.amount ──► moneyReceipts ──► running balance, FY table        │
/// │                                   └──► payee pending / collect          │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TS)]
#[ts(export)]
pub struct Money(#[ts(type = "number")] i64);

impl Money {
    /// Creates a Money value from paise (the smallest currency unit).
    #[inline]
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    /// Creates a Money value from whole rupees.
    ///
    /// ```rust
    /// use banquet_core::money::Money;
    ///
    /// assert_eq!(Money::from_rupees(25).paise(), 2500);
    /// ```
    #[inline]
    pub const fn from_rupees(rupees: i64) -> Self {
        Money(rupees.saturating_mul(100))
    }

    /// Converts a rupee float to paise, rounding to the nearest paisa.
    ///
    /// Only used at the JSON boundary. NaN and infinities become zero.
    pub fn from_rupees_f64(rupees: f64) -> Self {
        if !rupees.is_finite() {
            return Money::zero();
        }
        let paise = (rupees * 100.0).round();
        if paise >= i64::MAX as f64 || paise <= i64::MIN as f64 {
            return Money::zero();
        }
        Money(paise as i64)
    }

    /// Parses user-typed text leniently.
    ///
    /// Accepts a leading `₹` or `Rs.`, thousands separators and surrounding
    /// whitespace. A third decimal digit rounds half-up. Anything that still
    /// fails to parse yields zero.
    ///
    /// ```rust
    /// use banquet_core::money::Money;
    ///
    /// assert_eq!(Money::parse_lenient("₹ 1,23,456.75").paise(), 12345675);
    /// assert_eq!(Money::parse_lenient("-40").paise(), -4000);
    /// assert_eq!(Money::parse_lenient("ten").paise(), 0);
    /// assert_eq!(Money::parse_lenient("").paise(), 0);
    /// ```
    pub fn parse_lenient(input: &str) -> Money {
        Self::parse_strict(input).unwrap_or_default()
    }

    /// Parses user-typed text, returning `None` for anything unparseable.
    pub fn parse_strict(input: &str) -> Option<Money> {
        let mut text = input.trim();
        let negative = text.starts_with('-');
        if negative {
            text = text[1..].trim_start();
        }
        for prefix in ["₹", "Rs.", "Rs", "INR"] {
            if let Some(rest) = text.strip_prefix(prefix) {
                text = rest.trim_start();
                break;
            }
        }

        let cleaned: String = text.chars().filter(|c| *c != ',' && *c != ' ').collect();
        if cleaned.is_empty() {
            return None;
        }

        let (whole, fraction) = match cleaned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (cleaned.as_str(), ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }

        let rupees: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let digits: Vec<i64> = fraction
            .chars()
            .take(3)
            .filter_map(|c| c.to_digit(10).map(i64::from))
            .collect();
        let mut paise = digits.first().copied().unwrap_or(0) * 10 + digits.get(1).copied().unwrap_or(0);
        if digits.get(2).copied().unwrap_or(0) >= 5 {
            paise += 1;
        }

        let total = rupees.checked_mul(100)?.checked_add(paise)?;
        Some(Money(if negative { -total } else { total }))
    }

    /// Returns the value in paise.
    #[inline]
    pub const fn paise(&self) -> i64 {
        self.0
    }

    /// Returns the whole-rupee portion (truncated toward zero).
    #[inline]
    pub const fn rupees(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the paise portion (always 0-99).
    #[inline]
    pub const fn paise_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Rupee value as a float, for the JSON boundary only.
    #[inline]
    pub fn as_rupees_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Floors the value at zero.
    #[inline]
    pub const fn non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Calculates tax on this amount, rounding half-up to the paisa.
    ///
    /// ## Implementation
    /// Integer math: `(amount * rate + 5000) / 10000`
    /// The +5000 provides rounding (5000/10000 = 0.5)
    ///
    /// ## Example
    /// ```rust
    /// use banquet_core::money::{Money, GST_RATE};
    ///
    /// let base = Money::from_paise(10003);   // ₹100.03
    /// // ₹100.03 × 18% = ₹18.0054 → ₹18.01
    /// assert_eq!(base.calculate_tax(GST_RATE).paise(), 1801);
    /// ```
    ///
    /// ## User Workflow
    /// ```text
    /// gstBase (entered on the estimate)
    ///      │
    ///      ▼
    /// calculate_tax(18%) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// gstAmount ──► grandTotal
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // i128 keeps large bases from overflowing
        let tax_paise = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_paise(tax_paise as i64)
    }

    /// Multiplies money by a quantity (plates, pax, item count).
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Plain `1234.50` rendering for CSV cells and logs.
    pub fn to_fixed(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, self.rupees().abs(), self.paise_part())
    }
}

/// Groups an unsigned integer the Indian way: last three digits, then pairs.
///
/// `12345678` renders as `1,23,45,678`.
pub fn group_indian(value: u64) -> String {
    let digits = value.to_string();
    if digits.len() <= 3 {
        return digits;
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();
    format!("{},{}", groups.join(","), tail)
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display renders en-IN currency: `₹1,23,456.50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}₹{}.{:02}",
            sign,
            group_indian(self.rupees().unsigned_abs()),
            self.paise_part()
        )
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(self.0.saturating_neg())
    }
}

/// Multiplication by i64 (plate counts are i64 everywhere).
///
/// Arithmetic on `Money` saturates: counts typed into a form can be
/// arbitrarily large and a total must never abort the estimate.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Serde (rupees on the wire)
// =============================================================================

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % 100 == 0 {
            serializer.serialize_i64(self.rupees())
        } else {
            serializer.serialize_f64(self.as_rupees_f64())
        }
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LenientMoneyVisitor)
    }
}

struct LenientMoneyVisitor;

impl<'de> Visitor<'de> for LenientMoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a rupee amount")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        Ok(v.checked_mul(100).map(Money).unwrap_or_default())
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        Ok(i64::try_from(v)
            .ok()
            .and_then(|r| r.checked_mul(100))
            .map(Money)
            .unwrap_or_default())
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        Ok(Money::from_rupees_f64(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Ok(Money::parse_lenient(v))
    }

    fn visit_bool<E: de::Error>(self, _v: bool) -> Result<Money, E> {
        Ok(Money::zero())
    }

    fn visit_unit<E: de::Error>(self) -> Result<Money, E> {
        Ok(Money::zero())
    }

    fn visit_none<E: de::Error>(self) -> Result<Money, E> {
        Ok(Money::zero())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Money, D::Error> {
        deserializer.deserialize_any(LenientMoneyVisitor)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Money, A::Error> {
        while seq.next_element::<de::IgnoredAny>()?.is_some() {}
        Ok(Money::zero())
    }

    fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Money, A::Error> {
        while map.next_entry::<de::IgnoredAny, de::IgnoredAny>()?.is_some() {}
        Ok(Money::zero())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
