use async_trait::async_trait;

use crate::booking::BookingRecord;

/// Email/PDF ticket generation. Called after a booking is confirmed; owns its
/// own retries.
#[async_trait]
pub trait TicketDispatcher: Send + Sync {
    async fn dispatch_ticket(
        &self,
        record: &BookingRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Writes the dispatch to the log instead of sending anything.
pub struct LoggingTicketDispatcher;

#[async_trait]
impl TicketDispatcher for LoggingTicketDispatcher {
    async fn dispatch_ticket(
        &self,
        record: &BookingRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(
            "Ticket ready for PNR {} ({} seats: {})",
            record.booking.pnr,
            record.booking.total_seats,
            record.seat_numbers().join(", ")
        );
        Ok(())
    }
}
