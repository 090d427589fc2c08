use busline_core::repository::BookingRepository;
use busline_core::Clock;
use busline_order::ExpirySweeper;
use busline_store::app_config::BookingConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub fn spawn_expiry_worker(
    bookings: Arc<dyn BookingRepository>,
    clock: Arc<dyn Clock>,
    config: &BookingConfig,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let sweeper = ExpirySweeper::new(
        bookings,
        clock,
        config.expiry_batch_size,
        Duration::from_secs(config.expiry_sweep_interval_seconds.max(1)),
    );
    tokio::spawn(sweeper.run(shutdown))
}
