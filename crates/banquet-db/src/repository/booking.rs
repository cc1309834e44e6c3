//! # Booking Repository
//!
//! `prebookings/{month}` documents mapping `bookingId -> Booking`.
//!
//! Saves replace the whole booking entry: concurrent editors of the same
//! booking race and the last commit wins, including on `advancePayments`.
//! Payment mirrors go through [`BookingRepository::upsert_advance_in`],
//! which re-reads the booking inside the write transaction.

use tracing::{debug, info};

use banquet_core::{Booking, Payment};

use crate::documents::{collection, DocumentStore, WriteTx};
use crate::error::DbResult;

/// Repository for `prebookings`.
#[derive(Debug, Clone)]
pub struct BookingRepository {
    store: DocumentStore,
}

/// Fills identity fields an older document may lack from where it is stored.
fn placed(month: &str, id: &str, mut booking: Booking) -> Booking {
    if booking.id.is_empty() {
        booking.id = id.to_string();
    }
    if booking.source_doc.is_empty() {
        booking.source_doc = month.to_string();
    }
    booking
}

impl BookingRepository {
    pub fn new(store: DocumentStore) -> Self {
        BookingRepository { store }
    }

    pub async fn get(&self, month: &str, id: &str) -> DbResult<Option<Booking>> {
        let mut entries = self
            .store
            .load_entries::<Booking>(collection::PREBOOKINGS, month)
            .await?;
        Ok(entries.remove(id).map(|b| placed(month, id, b)))
    }

    /// Bookings of one month partition.
    pub async fn list_month(&self, month: &str) -> DbResult<Vec<Booking>> {
        let entries = self
            .store
            .load_entries::<Booking>(collection::PREBOOKINGS, month)
            .await?;
        Ok(entries
            .into_iter()
            .map(|(id, b)| placed(month, &id, b))
            .collect())
    }

    /// Every booking across all partitions.
    pub async fn list_all(&self) -> DbResult<Vec<Booking>> {
        let months = self
            .store
            .list_entries::<Booking>(collection::PREBOOKINGS)
            .await?;
        Ok(months
            .into_iter()
            .flat_map(|(month, entries)| {
                entries
                    .into_iter()
                    .map(move |(id, b)| placed(&month, &id, b))
            })
            .collect())
    }

    /// Scans every partition for a booking id.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Booking>> {
        Ok(self.list_all().await?.into_iter().find(|b| b.id == id))
    }

    /// Saves a booking in its own transaction.
    pub async fn save(&self, booking: &Booking) -> DbResult<()> {
        let mut tx = self.store.begin_write().await?;
        self.save_in(&mut tx, booking).await?;
        tx.commit().await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Inside a write transaction
    // -------------------------------------------------------------------------

    pub async fn get_in(&self, tx: &mut WriteTx, month: &str, id: &str) -> DbResult<Option<Booking>> {
        let mut entries = tx
            .load_entries::<Booking>(collection::PREBOOKINGS, month)
            .await?;
        Ok(entries.remove(id).map(|b| placed(month, id, b)))
    }

    pub async fn find_by_id_in(&self, tx: &mut WriteTx, id: &str) -> DbResult<Option<Booking>> {
        let months = tx.list_entries::<Booking>(collection::PREBOOKINGS).await?;
        Ok(months.into_iter().find_map(|(month, mut entries)| {
            entries.remove(id).map(|b| placed(&month, id, b))
        }))
    }

    /// Scans every partition for the booking holding an advance with this serial.
    pub async fn find_by_payment_in(&self, tx: &mut WriteTx, sl_no: &str) -> DbResult<Option<Booking>> {
        let months = tx.list_entries::<Booking>(collection::PREBOOKINGS).await?;
        Ok(months.into_iter().find_map(|(month, entries)| {
            entries
                .into_iter()
                .find(|(_, b)| b.find_advance(sl_no).is_some())
                .map(|(id, b)| placed(&month, &id, b))
        }))
    }

    /// Writes the booking under `booking.source_doc`.
    pub async fn save_in(&self, tx: &mut WriteTx, booking: &Booking) -> DbResult<()> {
        tx.merge_entry(collection::PREBOOKINGS, &booking.source_doc, &booking.id, booking)
            .await?;
        debug!(booking_id = %booking.id, month = %booking.source_doc, "Booking saved");
        Ok(())
    }

    pub async fn remove_in(&self, tx: &mut WriteTx, month: &str, id: &str) -> DbResult<bool> {
        tx.remove_entry(collection::PREBOOKINGS, month, id).await
    }

    /// Saves the booking under its new partition and drops the copy under
    /// `previous_month`.
    pub async fn relocate_in(&self, tx: &mut WriteTx, booking: &Booking, previous_month: &str) -> DbResult<()> {
        if previous_month != booking.source_doc {
            self.remove_in(tx, previous_month, &booking.id).await?;
            info!(
                booking_id = %booking.id,
                from = %previous_month,
                to = %booking.source_doc,
                "Booking moved between partitions"
            );
        }
        self.save_in(tx, booking).await
    }

    /// Inserts or replaces one advance on the stored booking.
    ///
    /// Looks under `month` first, then scans. Returns `None` when the booking
    /// cannot be found anywhere, `Some(replaced)` otherwise.
    pub async fn upsert_advance_in(
        &self,
        tx: &mut WriteTx,
        month: Option<&str>,
        booking_id: &str,
        payment: Payment,
    ) -> DbResult<Option<bool>> {
        let booking = match month {
            Some(month) => match self.get_in(tx, month, booking_id).await? {
                Some(b) => Some(b),
                None => self.find_by_id_in(tx, booking_id).await?,
            },
            None => self.find_by_id_in(tx, booking_id).await?,
        };
        let Some(mut booking) = booking else {
            return Ok(None);
        };

        let replaced = booking.upsert_advance(payment);
        self.save_in(tx, &booking).await?;
        Ok(Some(replaced))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use banquet_core::{Money, PaymentFor, PaymentMode};
    use serde_json::json;

    fn booking(id: &str, month: &str) -> Booking {
        Booking {
            id: id.to_string(),
            source_doc: month.to_string(),
            customer_name: "Sharma".to_string(),
            no_of_plates: 100,
            ..Default::default()
        }
    }

    fn advance(sl_no: &str, rupees: i64) -> Payment {
        Payment {
            sl_no: sl_no.to_string(),
            amount: Money::from_rupees(rupees),
            mode: PaymentMode::Cash,
            payment_for: PaymentFor::Credit,
            receipt_date: None,
            raw_receipt_date: None,
            receiver: "Ravi".to_string(),
            cash_to: None,
            description: String::new(),
            approval: Default::default(),
            booking_id: Some("b1".to_string()),
            source_doc: None,
            sender: None,
            party_name: None,
            my_name: None,
        }
    }

    #[tokio::test]
    async fn test_save_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let bookings = db.bookings();

        bookings.save(&booking("b1", "Sep2025")).await.unwrap();
        bookings.save(&booking("b2", "Sep2025")).await.unwrap();
        bookings.save(&booking("b3", "Oct2025")).await.unwrap();

        assert_eq!(bookings.list_month("Sep2025").await.unwrap().len(), 2);
        assert_eq!(bookings.list_all().await.unwrap().len(), 3);
        assert_eq!(bookings.find_by_id("b3").await.unwrap().unwrap().source_doc, "Oct2025");
        assert!(bookings.get("Sep2025", "b3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_relocate_moves_partition() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let bookings = db.bookings();
        bookings.save(&booking("b1", "Sep2025")).await.unwrap();

        let mut moved = booking("b1", "Nov2025");
        moved.customer_name = "Sharma & Sons".to_string();
        let mut tx = db.begin_write().await.unwrap();
        bookings.relocate_in(&mut tx, &moved, "Sep2025").await.unwrap();
        tx.commit().await.unwrap();

        assert!(bookings.get("Sep2025", "b1").await.unwrap().is_none());
        let stored = bookings.get("Nov2025", "b1").await.unwrap().unwrap();
        assert_eq!(stored.customer_name, "Sharma & Sons");
    }

    #[tokio::test]
    async fn test_upsert_advance_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let bookings = db.bookings();
        bookings.save(&booking("b1", "Sep2025")).await.unwrap();

        let mut tx = db.begin_write().await.unwrap();
        // Wrong hint falls back to a scan.
        let first = bookings
            .upsert_advance_in(&mut tx, Some("Aug2025"), "b1", advance("C1", 5000))
            .await
            .unwrap();
        let again = bookings
            .upsert_advance_in(&mut tx, Some("Sep2025"), "b1", advance("C1", 5000))
            .await
            .unwrap();
        let missing = bookings
            .upsert_advance_in(&mut tx, None, "nope", advance("C2", 10))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first, Some(false));
        assert_eq!(again, Some(true));
        assert_eq!(missing, None);

        let stored = bookings.get("Sep2025", "b1").await.unwrap().unwrap();
        assert_eq!(stored.advance_payments.len(), 1);
        assert_eq!(stored.total_paid(), Money::from_rupees(5000));
    }

    #[tokio::test]
    async fn test_unknown_fields_survive_save() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin_write().await.unwrap();
        tx.store(
            collection::PREBOOKINGS,
            "Sep2025",
            &json!({"b1": {"customerName": "Sharma", "stage": "confirmed", "noOfPlates": "120"}}),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let bookings = db.bookings();
        let mut stored = bookings.get("Sep2025", "b1").await.unwrap().unwrap();
        assert_eq!(stored.id, "b1");
        assert_eq!(stored.no_of_plates, 120);
        stored.hall_charges = Money::from_rupees(20_000);
        bookings.save(&stored).await.unwrap();

        let raw: serde_json::Value = db
            .documents()
            .load(collection::PREBOOKINGS, "Sep2025")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw["b1"]["stage"], "confirmed");
        assert_eq!(raw["b1"]["hallCharges"], 20000);
    }
}
