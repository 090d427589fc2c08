use busline_core::booking::BookingRecord;
use busline_core::ticketing::TicketDispatcher;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Sends the ticket on its own task. Failures are logged and go no further.
pub fn spawn_ticket_dispatch(dispatcher: Arc<dyn TicketDispatcher>, record: BookingRecord) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = dispatcher.dispatch_ticket(&record).await {
            tracing::error!("Ticket dispatch failed for PNR {}: {}", record.booking.pnr, e);
        }
    })
}
