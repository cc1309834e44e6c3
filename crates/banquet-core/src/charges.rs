//! # Charge Aggregator
//!
//! Turns a booking's menus, meals and custom charges into its invoiced
//! totals.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  selectedMenus ── rate × (noOfPlates + extraPlates) ──► menu rows      │
//! │                                                        │  Σ            │
//! │                                                        ▼               │
//! │                                                   totalAmount          │
//! │                                                                         │
//! │  meals ── Σ days Σ slots (total or pax × rate) ──► mealTotal            │
//! │                                                                         │
//! │  gstBase ── × 18% (half-up) ──► gstAmount                               │
//! │                                                                         │
//! │  per menu row: rowTotal + hallCharges + mealTotal + gstAmount          │
//! │                         │ Σ rows                                        │
//! │                         ▼                                               │
//! │                    grandTotal ── + custom charges − discount ──► net    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function here is total: malformed numbers were already coerced to
//! zero when the booking was read, so nothing in this module can fail.
//!
//! ## Grand Total Policy
//! With several menu categories selected, the per-row formula re-adds hall
//! charges, meals and GST once per row. [`GrandTotalPolicy::PerMenuRow`]
//! keeps that behaviour (stored bookings were written with it);
//! [`GrandTotalPolicy::SharedOnce`] adds the shared charges a single time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{Money, GST_RATE};
use crate::types::{Booking, CustomItem, CustomMenuCharge, MealEntry, MealSlot, Meals};

// =============================================================================
// Policy
// =============================================================================

/// How shared charges enter the grand total when several menus are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum GrandTotalPolicy {
    /// Each menu row adds hall charges, meals and GST again.
    #[default]
    PerMenuRow,
    /// Hall charges, meals and GST are added once.
    SharedOnce,
}

impl GrandTotalPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrandTotalPolicy::PerMenuRow => "per_menu_row",
            GrandTotalPolicy::SharedOnce => "shared_once",
        }
    }
}

impl fmt::Display for GrandTotalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrandTotalPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "per_menu_row" => Ok(GrandTotalPolicy::PerMenuRow),
            "shared_once" => Ok(GrandTotalPolicy::SharedOnce),
            other => Err(ValidationError::InvalidFormat {
                field: "grand_total_policy".to_string(),
                reason: format!("expected per_menu_row or shared_once, got '{other}'"),
            }),
        }
    }
}

// =============================================================================
// Primitive Computations
// =============================================================================

/// `rate * (basePlates + extraPlates)`.
#[inline]
pub fn compute_menu_row_total(rate: Money, base_plates: i64, extra_plates: i64) -> Money {
    rate * base_plates.saturating_add(extra_plates)
}

/// GST at 18% of the base, rounded half-up to the paisa.
#[inline]
pub fn compute_gst(gst_base: Money) -> Money {
    gst_base.calculate_tax(GST_RATE)
}

/// One menu row's grand total: the row plus the shared charges.
#[inline]
pub fn compute_grand_total_for_menu_row(
    menu_total: Money,
    hall_charges: Money,
    meal_total: Money,
    gst_amount: Money,
) -> Money {
    menu_total + hall_charges + meal_total + gst_amount
}

/// A meal slot's explicit total, or `pax * rate` when none was entered.
pub fn meal_slot_total(slot: &MealSlot) -> Money {
    if slot.total.is_zero() {
        slot.rate * slot.pax
    } else {
        slot.total
    }
}

/// Sum over every day and every slot object; other values are skipped.
pub fn compute_meal_total(meals: &Meals) -> Money {
    meals
        .values()
        .flat_map(|slots| slots.values())
        .filter_map(|entry| match entry {
            MealEntry::Slot(slot) => Some(meal_slot_total(slot)),
            MealEntry::Other(_) => None,
        })
        .sum()
}

/// A charge line's stored total, or `qty * rate` when the total is empty.
#[inline]
pub fn line_total(total: Money, qty: i64, rate: Money) -> Money {
    if total.is_zero() {
        rate * qty
    } else {
        total
    }
}

pub fn custom_items_total(items: &[CustomItem]) -> Money {
    items.iter().map(|i| line_total(i.total, i.qty, i.rate)).sum()
}

pub fn custom_menu_charges_total(charges: &[CustomMenuCharge]) -> Money {
    charges
        .iter()
        .map(|c| line_total(c.total, c.qty, c.rate))
        .sum()
}

// =============================================================================
// Booking-Level Aggregation
// =============================================================================

/// Pushes the booking's plate counts into every selected menu and
/// recomputes each row total.
pub fn apply_plate_counts(booking: &mut Booking) {
    let (base, extra) = (booking.no_of_plates, booking.extra_plates);
    for row in booking.selected_menus.values_mut() {
        row.no_of_plates = base;
        row.extra_plates = extra;
        row.total = compute_menu_row_total(row.rate, base, extra);
    }
}

/// One selected menu's contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MenuRowTotal {
    pub category: String,
    pub menu_total: Money,
    /// Row plus shared charges under `per_menu_row`; the bare row otherwise.
    pub grand_total: Money,
}

/// Everything the estimate screen shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    pub policy: GrandTotalPolicy,
    pub rows: Vec<MenuRowTotal>,
    /// Σ menu rows (stored as `totalAmount`).
    pub menu_total: Money,
    pub meal_total: Money,
    pub hall_charges: Money,
    pub custom_items_total: Money,
    pub custom_menu_charges_total: Money,
    pub gst_base: Money,
    pub gst_amount: Money,
    pub grand_total: Money,
    pub discount: Money,
    pub commission: Money,
    /// Grand total plus custom charges less discount, never below zero.
    pub net_payable: Money,
    pub total_paid: Money,
    /// May go negative when the customer has overpaid.
    pub balance_due: Money,
}

/// Computes the booking's totals without touching it.
///
/// ```rust
/// use banquet_core::charges::{summarize, GrandTotalPolicy};
/// use banquet_core::types::{Booking, SelectedMenu};
/// use banquet_core::Money;
///
/// let mut booking = Booking::default();
/// booking.no_of_plates = 100;
/// booking.selected_menus.insert(
///     "Gold".to_string(),
///     SelectedMenu { rate: Money::from_rupees(500), no_of_plates: 100, ..Default::default() },
/// );
/// let summary = summarize(&booking, GrandTotalPolicy::PerMenuRow);
/// assert_eq!(summary.menu_total, Money::from_rupees(50_000));
/// ```
pub fn summarize(booking: &Booking, policy: GrandTotalPolicy) -> BookingSummary {
    let meal_total = compute_meal_total(&booking.meals);
    let gst_amount = compute_gst(booking.gst_base);
    let hall_charges = booking.hall_charges;

    let rows: Vec<MenuRowTotal> = booking
        .selected_menus
        .iter()
        .map(|(category, row)| {
            let menu_total =
                compute_menu_row_total(row.rate, row.no_of_plates, row.extra_plates);
            let grand_total = match policy {
                GrandTotalPolicy::PerMenuRow => compute_grand_total_for_menu_row(
                    menu_total,
                    hall_charges,
                    meal_total,
                    gst_amount,
                ),
                GrandTotalPolicy::SharedOnce => menu_total,
            };
            MenuRowTotal {
                category: category.clone(),
                menu_total,
                grand_total,
            }
        })
        .collect();

    let menu_total: Money = rows.iter().map(|r| r.menu_total).sum();
    let grand_total = match policy {
        GrandTotalPolicy::PerMenuRow => rows.iter().map(|r| r.grand_total).sum(),
        GrandTotalPolicy::SharedOnce => {
            compute_grand_total_for_menu_row(menu_total, hall_charges, meal_total, gst_amount)
        }
    };

    let items_total = custom_items_total(&booking.custom_items);
    let menu_charges_total = custom_menu_charges_total(&booking.custom_menu_charges);
    let net_payable =
        (grand_total + items_total + menu_charges_total - booking.discount).non_negative();
    let total_paid = booking.total_paid();

    BookingSummary {
        policy,
        rows,
        menu_total,
        meal_total,
        hall_charges,
        custom_items_total: items_total,
        custom_menu_charges_total: menu_charges_total,
        gst_base: booking.gst_base,
        gst_amount,
        grand_total,
        discount: booking.discount,
        commission: booking.commission,
        net_payable,
        total_paid,
        balance_due: net_payable - total_paid,
    }
}

/// Recomputes row totals and writes the cached fields stored with a booking.
pub fn finalize_totals(booking: &mut Booking, policy: GrandTotalPolicy) -> BookingSummary {
    apply_plate_counts(booking);
    for item in booking.custom_items.iter_mut() {
        item.total = line_total(item.total, item.qty, item.rate);
    }
    for charge in booking.custom_menu_charges.iter_mut() {
        charge.total = line_total(charge.total, charge.qty, charge.rate);
    }

    let summary = summarize(booking, policy);
    booking.total_amount = summary.menu_total;
    booking.gst_amount = summary.gst_amount;
    booking.grand_total = summary.grand_total;
    summary
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SelectedMenu;
    use serde_json::json;

    fn rupees(r: i64) -> Money {
        Money::from_rupees(r)
    }

    fn sample_booking() -> Booking {
        serde_json::from_value(json!({
            "id": "b-1",
            "sourceDoc": "Sep2025",
            "noOfPlates": 100,
            "extraPlates": 10,
            "hallCharges": 20000,
            "gstBase": 60000,
            "selectedMenus": { "Gold": { "rate": 500 } },
            "meals": { "Day1": { "Lunch": { "pax": 110, "rate": 50 } } }
        }))
        .unwrap()
    }

    #[test]
    fn test_meal_total_additivity() {
        let meals: Meals = serde_json::from_value(json!({
            "Day1": {
                "Breakfast": { "pax": 10, "rate": 100 },
                "Lunch": { "total": 2000 }
            }
        }))
        .unwrap();
        assert_eq!(compute_meal_total(&meals), rupees(3000));
    }

    #[test]
    fn test_meal_total_ignores_garbage() {
        let meals: Meals = serde_json::from_value(json!({
            "Day1": { "Dinner": { "pax": "abc", "rate": 100 }, "notes": "no onion" },
            "Day2": { "Lunch": { "pax": "20", "rate": "75" } }
        }))
        .unwrap();
        assert_eq!(compute_meal_total(&meals), rupees(1500));
    }

    #[test]
    fn test_gst_correctness() {
        assert_eq!(compute_gst(Money::zero()), Money::zero());
        assert_eq!(compute_gst(rupees(60_000)), rupees(10_800));
        // ₹333.33 × 18% = ₹59.9994 → ₹60.00
        assert_eq!(compute_gst(Money::from_paise(33333)).paise(), 6000);
        for paise in [1_i64, 3, 99, 12_345, 987_654_321] {
            let expected = (paise as f64 * 0.18).round() as i64;
            assert_eq!(compute_gst(Money::from_paise(paise)).paise(), expected);
        }
    }

    #[test]
    fn test_end_to_end_single_menu() {
        let mut booking = sample_booking();
        let summary = finalize_totals(&mut booking, GrandTotalPolicy::PerMenuRow);

        assert_eq!(summary.menu_total, rupees(55_000));
        assert_eq!(summary.meal_total, rupees(5_500));
        assert_eq!(summary.gst_amount, rupees(10_800));
        assert_eq!(summary.grand_total, rupees(91_300));
        assert_eq!(booking.total_amount, rupees(55_000));
        assert_eq!(booking.grand_total, rupees(91_300));
        assert_eq!(booking.selected_menus["Gold"].total, rupees(55_000));
    }

    #[test]
    fn test_per_menu_row_repeats_shared_charges() {
        let mut booking = sample_booking();
        booking.selected_menus.insert(
            "Silver".to_string(),
            SelectedMenu {
                rate: rupees(300),
                ..Default::default()
            },
        );
        apply_plate_counts(&mut booking);

        let per_row = summarize(&booking, GrandTotalPolicy::PerMenuRow);
        let shared = summarize(&booking, GrandTotalPolicy::SharedOnce);

        // Gold 55,000 + Silver 33,000; shared charges 36,300
        assert_eq!(per_row.menu_total, rupees(88_000));
        assert_eq!(per_row.grand_total, rupees(88_000 + 2 * 36_300));
        assert_eq!(shared.grand_total, rupees(88_000 + 36_300));
    }

    #[test]
    fn test_no_menus_yields_zero_grand_total_per_row() {
        let mut booking = sample_booking();
        booking.selected_menus.clear();
        assert_eq!(
            summarize(&booking, GrandTotalPolicy::PerMenuRow).grand_total,
            Money::zero()
        );
        assert_eq!(
            summarize(&booking, GrandTotalPolicy::SharedOnce).grand_total,
            rupees(20_000 + 5_500 + 10_800)
        );
    }

    #[test]
    fn test_plate_change_recomputes_existing_rows() {
        let mut booking = sample_booking();
        finalize_totals(&mut booking, GrandTotalPolicy::PerMenuRow);
        booking.extra_plates = 20;
        finalize_totals(&mut booking, GrandTotalPolicy::PerMenuRow);
        assert_eq!(booking.selected_menus["Gold"].total, rupees(60_000));
        assert_eq!(booking.selected_menus["Gold"].extra_plates, 20);
    }

    #[test]
    fn test_custom_charges_and_discount() {
        let mut booking = sample_booking();
        booking.custom_items.push(CustomItem {
            name: "DJ".to_string(),
            qty: 1,
            rate: rupees(8_000),
            total: Money::zero(),
        });
        booking.custom_menu_charges.push(CustomMenuCharge {
            name: "Live counter".to_string(),
            qty: 2,
            rate: rupees(1_500),
            total: rupees(2_500),
        });
        booking.discount = rupees(1_300);

        let summary = finalize_totals(&mut booking, GrandTotalPolicy::PerMenuRow);
        assert_eq!(summary.custom_items_total, rupees(8_000));
        assert_eq!(summary.custom_menu_charges_total, rupees(2_500));
        assert_eq!(summary.net_payable, rupees(91_300 + 8_000 + 2_500 - 1_300));
        assert_eq!(booking.custom_items[0].total, rupees(8_000));
    }

    #[test]
    fn test_net_payable_floors_at_zero() {
        let mut booking = sample_booking();
        booking.discount = rupees(1_000_000);
        assert_eq!(
            summarize(&booking, GrandTotalPolicy::PerMenuRow).net_payable,
            Money::zero()
        );
    }

    #[test]
    fn test_oversized_plate_count_saturates() {
        let mut booking: Booking = serde_json::from_value(json!({
            "id": "b-2",
            "noOfPlates": "100000000000000000",
            "extraPlates": "9223372036854775807",
            "gstBase": 60000,
            "selectedMenus": { "Gold": { "rate": 500 } },
            "customItems": [{ "name": "Chairs", "qty": "99999999999999999", "rate": 40 }]
        }))
        .unwrap();
        assert_eq!(booking.no_of_plates, 100_000_000_000_000_000);

        let summary = finalize_totals(&mut booking, GrandTotalPolicy::PerMenuRow);
        assert_eq!(summary.menu_total.paise(), i64::MAX);
        assert_eq!(summary.grand_total.paise(), i64::MAX);
        assert_eq!(summary.net_payable.paise(), i64::MAX);
        assert_eq!(booking.selected_menus["Gold"].total.paise(), i64::MAX);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            "shared-once".parse::<GrandTotalPolicy>().unwrap(),
            GrandTotalPolicy::SharedOnce
        );
        assert!("split".parse::<GrandTotalPolicy>().is_err());
        assert_eq!(GrandTotalPolicy::default(), GrandTotalPolicy::PerMenuRow);
    }
}
