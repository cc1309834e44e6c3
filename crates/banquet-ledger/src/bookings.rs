//! # Booking Service
//!
//! Estimate computation and persistence for `prebookings`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  form edit ──► estimate() ──► BookingSummary (nothing stored)          │
//! │                                                                         │
//! │  submit ──► save()                                                     │
//! │              validate id, month, plate counts                          │
//! │              finalize_totals (rows, totalAmount, gstAmount, grandTotal)│
//! │              prebookings/{sourceDoc}[id] = booking                     │
//! │              (dropped from the previous month when it moved)           │
//! │                                                                         │
//! │  cancel ──► prebookings/{month}[id] removed                            │
//! │             cancelledBookings/{id} = booking + refundPayments          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Saves replace the whole booking. Two staff editing the same booking at
//! once race, and the last save wins.

use banquet_core::charges::{apply_plate_counts, finalize_totals, summarize};
use banquet_core::validation::{validate_booking_id, validate_month_key, validate_plate_counts};
use banquet_core::{Booking, BookingSummary, CancelledBooking, GrandTotalPolicy, SerialCounter, ValidationError};
use banquet_db::Database;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{LedgerError, LedgerResult};
use crate::retry::with_write_retry;
use crate::writer::LedgerWriter;

/// Totals for a booking as the form currently shows it. Nothing is stored.
pub fn estimate(booking: &Booking, policy: GrandTotalPolicy) -> BookingSummary {
    let mut draft = booking.clone();
    apply_plate_counts(&mut draft);
    summarize(&draft, policy)
}

#[derive(Debug, Clone)]
pub struct BookingService {
    db: Database,
    writer: LedgerWriter,
    policy: GrandTotalPolicy,
}

impl BookingService {
    pub fn new(writer: LedgerWriter, policy: GrandTotalPolicy) -> Self {
        BookingService {
            db: writer.database().clone(),
            writer,
            policy,
        }
    }

    pub fn policy(&self) -> GrandTotalPolicy {
        self.policy
    }

    /// Totals for the current form state. Cheap enough to run per keystroke.
    pub fn estimate(&self, booking: &Booking) -> BookingSummary {
        estimate(booking, self.policy)
    }

    /// Adds a menu category at its catalog price, sized to the booking's
    /// current plate counts.
    pub async fn add_menu_from_catalog(
        &self,
        booking: &mut Booking,
        meal_period: &str,
        category: &str,
    ) -> LedgerResult<()> {
        let catalog = self.db.catalog().get(meal_period).await?.unwrap_or_default();
        let row = catalog
            .select(category, booking.no_of_plates, booking.extra_plates)
            .ok_or_else(|| {
                LedgerError::Validation(ValidationError::InvalidFormat {
                    field: "category".to_string(),
                    reason: format!("'{category}' is not on the {meal_period} menu"),
                })
            })?;
        booking.selected_menus.insert(category.to_string(), row);
        Ok(())
    }

    /// Validates, recomputes the cached totals and stores the booking.
    ///
    /// `previous_month` is the partition the booking was loaded from; when
    /// it differs from `source_doc` the old copy is removed in the same
    /// transaction.
    pub async fn save(&self, booking: &mut Booking, previous_month: Option<&str>) -> LedgerResult<BookingSummary> {
        booking.id = validate_booking_id(&booking.id)?;
        validate_month_key(&booking.source_doc)?;
        if let Some(previous) = previous_month {
            validate_month_key(previous)?;
        }
        validate_plate_counts(booking.no_of_plates, booking.extra_plates)?;

        let summary = finalize_totals(booking, self.policy);
        let stored: &Booking = booking;
        let db = &self.db;

        with_write_retry(self.writer.retry_settings(), "save_booking", move || async move {
            let mut tx = db.begin_write().await?;
            match previous_month {
                Some(previous) => db.bookings().relocate_in(&mut tx, stored, previous).await?,
                None => db.bookings().save_in(&mut tx, stored).await?,
            }
            tx.commit().await?;
            Ok::<_, LedgerError>(())
        })
        .await?;

        info!(
            booking_id = %booking.id,
            month = %booking.source_doc,
            grand_total = %summary.grand_total,
            "Booking saved"
        );
        Ok(summary)
    }

    /// Moves a booking to `cancelledBookings`, keeping refunds already
    /// recorded against it.
    pub async fn cancel(&self, booking_id: &str) -> LedgerResult<CancelledBooking> {
        let booking_id = validate_booking_id(booking_id)?;
        let db = &self.db;
        let id = booking_id.as_str();

        let record = with_write_retry(self.writer.retry_settings(), "cancel_booking", move || async move {
            let mut tx = db.begin_write().await?;
            let booking = db
                .bookings()
                .find_by_id_in(&mut tx, id)
                .await?
                .ok_or_else(|| LedgerError::BookingNotFound(id.to_string()))?;

            let refund_payments = db
                .cancellations()
                .get_in(&mut tx, id)
                .await?
                .map(|existing| existing.refund_payments)
                .unwrap_or_default();

            db.bookings().remove_in(&mut tx, &booking.source_doc, id).await?;
            let record = CancelledBooking {
                booking,
                refund_payments,
            };
            db.cancellations().save_in(&mut tx, &record).await?;
            tx.commit().await?;
            Ok::<_, LedgerError>(record)
        })
        .await?;

        info!(
            booking_id = %booking_id,
            month = %record.booking.source_doc,
            refunds = record.refund_payments.len(),
            "Booking cancelled"
        );
        Ok(record)
    }

    /// Serial for a decoration booking.
    pub async fn allocate_event_serial(&self) -> LedgerResult<String> {
        self.writer.allocate_serial(SerialCounter::GlobalEvents).await
    }

    /// Whether `email` may edit `booking_id` at `now`. Unknown accounts may not.
    pub async fn can_edit(&self, email: &str, booking_id: &str, now: DateTime<Utc>) -> LedgerResult<bool> {
        let allowed = match self.db.access().get(email).await? {
            Some(access) => access.can_edit_booking(booking_id, now),
            None => false,
        };
        debug!(email = %email, booking_id = %booking_id, allowed, "Edit access checked");
        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AllocationSettings;
    use crate::writer::{PaymentDraft, PaymentTarget};
    use banquet_core::{AccessState, MenuCatalog, MenuCategory, Money, PaymentFor, PaymentMode, UserAccess};
    use banquet_db::DbConfig;
    use chrono::{Duration, NaiveDate};
    use serde_json::json;

    async fn service(policy: GrandTotalPolicy) -> BookingService {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        BookingService::new(LedgerWriter::new(db, AllocationSettings::default()), policy)
    }

    fn wedding() -> Booking {
        serde_json::from_value(json!({
            "id": "b-100",
            "sourceDoc": "Dec2025",
            "customerName": "Sharma",
            "contactNo": "9800000000",
            "noOfPlates": 100,
            "extraPlates": 10,
            "hallCharges": 20000,
            "gstBase": 60000,
            "selectedMenus": { "Gold": { "rate": 500, "noOfPlates": 0, "extraPlates": 0 } },
            "meals": { "Day1": { "Lunch": { "pax": 110, "rate": 50 } } }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_end_to_end_totals() {
        let service = service(GrandTotalPolicy::PerMenuRow).await;
        let mut booking = wedding();

        let summary = service.save(&mut booking, None).await.unwrap();
        assert_eq!(summary.menu_total, Money::from_rupees(55_000));
        assert_eq!(summary.meal_total, Money::from_rupees(5_500));
        assert_eq!(summary.gst_amount, Money::from_rupees(10_800));
        assert_eq!(summary.grand_total, Money::from_rupees(91_300));

        let stored = service.db.bookings().get("Dec2025", "b-100").await.unwrap().unwrap();
        assert_eq!(stored.grand_total, Money::from_rupees(91_300));
        assert_eq!(stored.total_amount, Money::from_rupees(55_000));
        assert_eq!(stored.selected_menus["Gold"].no_of_plates, 100);
    }

    #[tokio::test]
    async fn test_estimate_does_not_store() {
        let service = service(GrandTotalPolicy::PerMenuRow).await;
        let booking = wedding();

        let summary = service.estimate(&booking);
        assert_eq!(summary.grand_total, Money::from_rupees(91_300));
        assert!(service.db.bookings().list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shared_once_policy() {
        let service = service(GrandTotalPolicy::SharedOnce).await;
        let mut booking = wedding();
        booking.selected_menus.insert(
            "Silver".to_string(),
            banquet_core::SelectedMenu {
                rate: Money::from_rupees(300),
                ..Default::default()
            },
        );

        let summary = service.estimate(&booking);
        // 55,000 + 33,000 menus, hall 20,000, meals 5,500, GST 10,800 once.
        assert_eq!(summary.grand_total, Money::from_rupees(124_300));
    }

    #[tokio::test]
    async fn test_save_moves_between_months() {
        let service = service(GrandTotalPolicy::PerMenuRow).await;
        let mut booking = wedding();
        service.save(&mut booking, None).await.unwrap();

        booking.source_doc = "Jan2026".to_string();
        service.save(&mut booking, Some("Dec2025")).await.unwrap();

        let bookings = service.db.bookings();
        assert!(bookings.get("Dec2025", "b-100").await.unwrap().is_none());
        assert!(bookings.get("Jan2026", "b-100").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_save_rejects_bad_input() {
        let service = service(GrandTotalPolicy::PerMenuRow).await;

        let mut bad_month = wedding();
        bad_month.source_doc = "December".to_string();
        assert!(service.save(&mut bad_month, None).await.unwrap_err().is_rejection());

        let mut bad_plates = wedding();
        bad_plates.no_of_plates = -5;
        assert!(service.save(&mut bad_plates, None).await.unwrap_err().is_rejection());

        assert!(service.db.bookings().list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_menu_from_catalog() {
        let service = service(GrandTotalPolicy::PerMenuRow).await;
        let mut catalog = MenuCatalog::default();
        catalog.categories.insert(
            "Platinum".to_string(),
            MenuCategory {
                price: Money::from_rupees(750),
                ..Default::default()
            },
        );
        service.db.catalog().save("Dinner", &catalog).await.unwrap();

        let mut booking = wedding();
        service
            .add_menu_from_catalog(&mut booking, "Dinner", "Platinum")
            .await
            .unwrap();
        assert_eq!(booking.selected_menus["Platinum"].total, Money::from_rupees(82_500));

        let missing = service.add_menu_from_catalog(&mut booking, "Dinner", "Bronze").await;
        assert!(missing.unwrap_err().is_rejection());
    }

    #[tokio::test]
    async fn test_cancel_keeps_earlier_refunds() {
        let service = service(GrandTotalPolicy::PerMenuRow).await;
        let mut booking = wedding();
        service.save(&mut booking, None).await.unwrap();

        // Refund recorded before the booking was moved.
        service
            .writer
            .record_payment(
                PaymentDraft::new(
                    Money::from_rupees(5_000),
                    PaymentMode::Cash,
                    PaymentFor::Debit,
                    NaiveDate::from_ymd_opt(2025, 11, 20).unwrap(),
                    "Sharma",
                ),
                PaymentTarget::Refund {
                    booking_id: "b-100".to_string(),
                },
            )
            .await
            .unwrap();

        let record = service.cancel("b-100").await.unwrap();
        assert_eq!(record.booking.customer_name, "Sharma");
        assert_eq!(record.total_refunded(), Money::from_rupees(5_000));

        assert!(service.db.bookings().find_by_id("b-100").await.unwrap().is_none());
        let stored = service.db.cancellations().get("b-100").await.unwrap().unwrap();
        assert_eq!(stored.refund_payments.len(), 1);
        assert_eq!(stored.booking.grand_total, Money::from_rupees(91_300));

        let again = service.cancel("b-100").await.unwrap_err();
        assert!(matches!(again, LedgerError::BookingNotFound(_)));
    }

    #[tokio::test]
    async fn test_event_serials() {
        let service = service(GrandTotalPolicy::PerMenuRow).await;
        assert_eq!(service.allocate_event_serial().await.unwrap(), "1");
        assert_eq!(service.allocate_event_serial().await.unwrap(), "2");
    }

    #[tokio::test]
    async fn test_can_edit() {
        let service = service(GrandTotalPolicy::PerMenuRow).await;
        let now = Utc::now();
        service
            .db
            .access()
            .save(&UserAccess {
                name: "Priya".to_string(),
                email: "Priya@Example.com".to_string(),
                access: AccessState::Enable,
                editable_prebookings: vec!["b-100".to_string()],
                edit_expiry: Some(now - Duration::hours(1)),
                edit_data: true,
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(service.can_edit("priya@example.com", "b-100", now).await.unwrap());
        assert!(!service.can_edit("priya@example.com", "b-200", now).await.unwrap());
        assert!(!service.can_edit("stranger@example.com", "b-100", now).await.unwrap());
    }
}
