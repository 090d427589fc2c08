use busline_core::repository::BookingRepository;
use busline_core::{Clock, CoreResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    /// Confirmed or cancelled between listing and locking, or failed.
    pub skipped: usize,
}

/// Cancels Pending bookings whose hold has run out and returns their seats.
pub struct ExpirySweeper {
    bookings: Arc<dyn BookingRepository>,
    clock: Arc<dyn Clock>,
    batch_size: i64,
    period: Duration,
}

impl ExpirySweeper {
    pub fn new(bookings: Arc<dyn BookingRepository>, clock: Arc<dyn Clock>, batch_size: i64, period: Duration) -> Self {
        Self { bookings, clock, batch_size, period }
    }

    /// Expires overdue holds page by page until a short page comes back or a
    /// page expires nothing.
    pub async fn sweep_once(&self) -> CoreResult<SweepReport> {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        loop {
            let overdue = self.bookings.overdue_pending(now, self.batch_size).await?;
            let page_len = overdue.len();
            let mut expired_in_page = 0;

            for booking_id in overdue {
                match self.bookings.expire_booking(booking_id, now).await {
                    Ok(Some(record)) => {
                        info!(
                            "Expired booking {} and released {} seats",
                            record.booking.pnr,
                            record.seats.len()
                        );
                        expired_in_page += 1;
                    }
                    Ok(None) => report.skipped += 1,
                    Err(e) => {
                        warn!("Could not expire booking {}: {}", booking_id, e);
                        report.skipped += 1;
                    }
                }
            }
            report.expired += expired_in_page;

            if (page_len as i64) < self.batch_size || expired_in_page == 0 {
                break;
            }
        }
        Ok(report)
    }

    /// Sweeps every period until `shutdown` turns true or its sender drops.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("Expiry sweeper started, period {:?}", self.period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep_once().await {
                        Ok(report) if report.expired > 0 || report.skipped > 0 => {
                            info!("Sweep done: {} expired, {} skipped", report.expired, report.skipped);
                        }
                        Ok(_) => {}
                        Err(e) => error!("Expiry sweep failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Expiry sweeper stopped");
    }
}
