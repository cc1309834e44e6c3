//! # Cancellation Repository
//!
//! `cancelledBookings/{bookingId}`: the booking fields plus its refunds.
//! Not partitioned by month.

use tracing::debug;

use banquet_core::{Booking, CancelledBooking, Payment};

use crate::documents::{collection, DocumentStore, WriteTx};
use crate::error::DbResult;

/// Repository for `cancelledBookings`.
#[derive(Debug, Clone)]
pub struct CancellationRepository {
    store: DocumentStore,
}

impl CancellationRepository {
    pub fn new(store: DocumentStore) -> Self {
        CancellationRepository { store }
    }

    pub async fn get(&self, booking_id: &str) -> DbResult<Option<CancelledBooking>> {
        self.store.load(collection::CANCELLED_BOOKINGS, booking_id).await
    }

    pub async fn list(&self) -> DbResult<Vec<CancelledBooking>> {
        let docs = self.store.list(collection::CANCELLED_BOOKINGS).await?;
        Ok(docs.into_iter().map(|(_, doc)| doc).collect())
    }

    pub async fn get_in(&self, tx: &mut WriteTx, booking_id: &str) -> DbResult<Option<CancelledBooking>> {
        tx.load(collection::CANCELLED_BOOKINGS, booking_id).await
    }

    pub async fn save_in(&self, tx: &mut WriteTx, cancelled: &CancelledBooking) -> DbResult<()> {
        tx.store(collection::CANCELLED_BOOKINGS, &cancelled.booking.id, cancelled)
            .await
    }

    /// Inserts or replaces one refund on the cancellation record, creating a
    /// bare record when the booking was never moved here.
    ///
    /// Returns true when an existing refund was replaced.
    pub async fn upsert_refund_in(
        &self,
        tx: &mut WriteTx,
        booking_id: &str,
        payment: Payment,
    ) -> DbResult<bool> {
        let mut record = self.get_in(tx, booking_id).await?.unwrap_or_else(|| CancelledBooking {
            booking: Booking {
                id: booking_id.to_string(),
                ..Default::default()
            },
            refund_payments: Vec::new(),
        });
        if record.booking.id.is_empty() {
            record.booking.id = booking_id.to_string();
        }

        let replaced = record.upsert_refund(payment);
        self.save_in(tx, &record).await?;
        debug!(booking_id = %booking_id, replaced, "Refund recorded");
        Ok(replaced)
    }

    /// Finds the record holding a refund with this serial.
    pub async fn find_by_refund_in(&self, tx: &mut WriteTx, sl_no: &str) -> DbResult<Option<CancelledBooking>> {
        let docs: Vec<(String, CancelledBooking)> = tx.list(collection::CANCELLED_BOOKINGS).await?;
        Ok(docs
            .into_iter()
            .map(|(_, doc)| doc)
            .find(|doc| doc.refund_payments.iter().any(|p| p.sl_no == sl_no)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use banquet_core::{Money, PaymentFor, PaymentMode};

    fn refund(sl_no: &str, rupees: i64) -> Payment {
        Payment {
            sl_no: sl_no.to_string(),
            amount: Money::from_rupees(rupees),
            mode: PaymentMode::Bank("HDFC".to_string()),
            payment_for: PaymentFor::Debit,
            receipt_date: None,
            raw_receipt_date: None,
            receiver: "Ravi".to_string(),
            cash_to: None,
            description: "refund".to_string(),
            approval: Default::default(),
            booking_id: Some("b9".to_string()),
            source_doc: None,
            sender: None,
            party_name: None,
            my_name: None,
        }
    }

    #[tokio::test]
    async fn test_refunds_accumulate_by_serial() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let cancellations = db.cancellations();

        let mut tx = db.begin_write().await.unwrap();
        assert!(!cancellations.upsert_refund_in(&mut tx, "b9", refund("R1", 2000)).await.unwrap());
        assert!(!cancellations.upsert_refund_in(&mut tx, "b9", refund("R2", 500)).await.unwrap());
        assert!(cancellations.upsert_refund_in(&mut tx, "b9", refund("R1", 2000)).await.unwrap());
        let holder = cancellations.find_by_refund_in(&mut tx, "R2").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(holder.unwrap().booking.id, "b9");
        let record = cancellations.get("b9").await.unwrap().unwrap();
        assert_eq!(record.refund_payments.len(), 2);
        assert_eq!(record.total_refunded(), Money::from_rupees(2500));
        assert_eq!(cancellations.list().await.unwrap().len(), 1);
    }
}
