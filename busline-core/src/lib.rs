pub mod booking;
pub mod clock;
pub mod identity;
pub mod money;
pub mod payment;
pub mod places;
pub mod repository;
pub mod schedule;
pub mod search;
pub mod ticketing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use money::Money;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Seats already booked: {}", .0.join(", "))]
    SeatsUnavailable(Vec<String>),
    #[error("Invalid boarding/dropping selection: {0}")]
    InvalidStopSelection(String),
    #[error("Booking already confirmed: {0}")]
    BookingAlreadyConfirmed(String),
    #[error("Booking hold expired: {0}")]
    BookingExpired(String),
    #[error("Booking cancelled: {0}")]
    BookingCancelled(String),
    #[error("Storage error: {0}")]
    StorageError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
