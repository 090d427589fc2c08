pub mod expiry;
pub mod notify;
pub mod pnr;
pub mod service;
pub mod validator;

pub use expiry::{ExpirySweeper, SweepReport};
pub use pnr::PnrGenerator;
pub use service::{BookingRules, BookingService, ReservationRequest};
pub use validator::{SeatSelection, SeatStopValidator};
