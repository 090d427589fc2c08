use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payment::PaymentSignal;
use crate::schedule::text_enum;
use crate::{CoreError, CoreResult, Money};

/// Booking lifecycle.
///
/// `Pending -> Confirmed` and `Pending -> Cancelled` are the only transitions;
/// both targets are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

text_enum!(BookingStatus {
    Pending => "PENDING",
    Confirmed => "CONFIRMED",
    Cancelled => "CANCELLED",
});

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancellationReason {
    PaymentFailed,
    HoldExpired,
}

text_enum!(CancellationReason {
    PaymentFailed => "PAYMENT_FAILED",
    HoldExpired => "HOLD_EXPIRED",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub pnr: String,
    pub customer_id: Uuid,
    pub total_seats: i32,
    pub total_amount: Money,
    pub status: BookingStatus,
    pub cancellation_reason: Option<CancellationReason>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub hold_expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_hold_elapsed(&self, now: DateTime<Utc>) -> bool {
        now >= self.hold_expires_at
    }

    /// Fails unless the booking is still Pending, naming the terminal state it reached.
    pub fn ensure_pending(&self) -> CoreResult<()> {
        match (self.status, self.cancellation_reason) {
            (BookingStatus::Pending, _) => Ok(()),
            (BookingStatus::Confirmed, _) => Err(CoreError::BookingAlreadyConfirmed(self.pnr.clone())),
            (BookingStatus::Cancelled, Some(CancellationReason::PaymentFailed)) => {
                Err(CoreError::BookingCancelled(self.pnr.clone()))
            }
            (BookingStatus::Cancelled, _) => Err(CoreError::BookingExpired(self.pnr.clone())),
        }
    }

    /// Applies a payment result to a Pending booking inside its hold window.
    ///
    /// Returns the new status. On error the booking is left untouched.
    pub fn apply_payment(&mut self, signal: &PaymentSignal, now: DateTime<Utc>) -> CoreResult<BookingStatus> {
        self.ensure_pending()?;
        if self.is_hold_elapsed(now) {
            return Err(CoreError::BookingExpired(self.pnr.clone()));
        }

        self.payment_reference = Some(signal.payment_reference_id.clone());
        if signal.success {
            self.status = BookingStatus::Confirmed;
        } else {
            self.status = BookingStatus::Cancelled;
            self.cancellation_reason = Some(CancellationReason::PaymentFailed);
        }
        self.updated_at = now;
        Ok(self.status)
    }

    /// Cancels an overdue Pending booking. Returns `false` when there is
    /// nothing to expire (already terminal, or still inside its hold).
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != BookingStatus::Pending || !self.is_hold_elapsed(now) {
            return false;
        }
        self.status = BookingStatus::Cancelled;
        self.cancellation_reason = Some(CancellationReason::HoldExpired);
        self.updated_at = now;
        true
    }
}

/// The schedule-specific slice of a booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingSegment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub schedule_id: Uuid,
    pub travel_date: NaiveDate,
    pub seats_booked: i32,
    pub amount: Money,
    pub boarding_stop_id: Uuid,
    pub dropping_stop_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passenger {
    pub name: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookedSeat {
    pub id: Uuid,
    pub segment_id: Uuid,
    pub schedule_id: Uuid,
    pub travel_date: NaiveDate,
    pub seat_number: String,
    pub passenger: Passenger,
    pub price: Money,
    pub is_active: bool,
}

/// Booking, segments and seats as stored together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingRecord {
    pub booking: Booking,
    pub segments: Vec<BookingSegment>,
    pub seats: Vec<BookedSeat>,
}

impl BookingRecord {
    pub fn seat_numbers(&self) -> Vec<String> {
        self.seats.iter().map(|s| s.seat_number.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct PricedSeat {
    pub seat_number: String,
    pub passenger: Passenger,
    pub price: Money,
}

/// Input to the booking commit. Everything is decided before storage is
/// touched; the repository only re-checks occupancy and writes.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub pnr: String,
    pub customer_id: Uuid,
    pub schedule_id: Uuid,
    pub travel_date: NaiveDate,
    pub boarding_stop_id: Uuid,
    pub dropping_stop_id: Uuid,
    pub seats: Vec<PricedSeat>,
    pub created_at: DateTime<Utc>,
    pub hold_expires_at: DateTime<Utc>,
}

impl NewReservation {
    pub fn seat_count(&self) -> i32 {
        self.seats.len() as i32
    }

    pub fn total_amount(&self) -> Money {
        self.seats.iter().map(|s| s.price).sum()
    }

    pub fn seat_numbers(&self) -> Vec<String> {
        self.seats.iter().map(|s| s.seat_number.clone()).collect()
    }

    /// Builds the rows the commit writes, with fresh ids.
    pub fn to_record(&self) -> BookingRecord {
        let booking_id = Uuid::new_v4();
        let segment_id = Uuid::new_v4();
        let booking = Booking {
            id: booking_id,
            pnr: self.pnr.clone(),
            customer_id: self.customer_id,
            total_seats: self.seat_count(),
            total_amount: self.total_amount(),
            status: BookingStatus::Pending,
            cancellation_reason: None,
            payment_reference: None,
            created_at: self.created_at,
            hold_expires_at: self.hold_expires_at,
            updated_at: self.created_at,
        };
        let segment = BookingSegment {
            id: segment_id,
            booking_id,
            schedule_id: self.schedule_id,
            travel_date: self.travel_date,
            seats_booked: self.seat_count(),
            amount: self.total_amount(),
            boarding_stop_id: self.boarding_stop_id,
            dropping_stop_id: self.dropping_stop_id,
        };
        let seats = self
            .seats
            .iter()
            .map(|s| BookedSeat {
                id: Uuid::new_v4(),
                segment_id,
                schedule_id: self.schedule_id,
                travel_date: self.travel_date,
                seat_number: s.seat_number.clone(),
                passenger: s.passenger.clone(),
                price: s.price,
                is_active: true,
            })
            .collect();

        BookingRecord { booking, segments: vec![segment], seats }
    }
}

/// Returned to the customer after a successful hold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingConfirmation {
    pub pnr: String,
    pub booking_id: Uuid,
    pub total_amount: Money,
    pub seat_numbers: Vec<String>,
    pub boarding_point: String,
    pub boarding_time: Option<NaiveTime>,
    pub dropping_point: String,
    pub dropping_time: Option<NaiveTime>,
    pub reservation_expiry_time: DateTime<Utc>,
}
