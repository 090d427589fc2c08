use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use crate::booking::{BookingRecord, NewReservation};
use crate::payment::PaymentSignal;
use crate::schedule::ScheduleDetail;
use crate::search::ScheduleSummary;
use crate::CoreResult;

/// Read side of schedules and seat occupancy. Nothing here is transactional.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Schedules operating on `travel_date` whose route visits `source` before `destination`.
    async fn find_schedules(
        &self,
        source: &str,
        destination: &str,
        travel_date: NaiveDate,
    ) -> CoreResult<Vec<ScheduleSummary>>;

    /// `None` when the schedule does not exist or does not run on that date.
    async fn schedule_detail(
        &self,
        schedule_id: Uuid,
        travel_date: NaiveDate,
    ) -> CoreResult<Option<ScheduleDetail>>;

    async fn booked_seat_numbers(
        &self,
        schedule_id: Uuid,
        travel_date: NaiveDate,
    ) -> CoreResult<HashSet<String>>;
}

/// Write side of bookings. Every method is one atomic unit.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Writes booking, segment and seats and decrements availability, after
    /// re-checking occupancy under the same lock. Fails with
    /// `SeatsUnavailable` if any requested seat is taken.
    async fn commit_reservation(&self, reservation: &NewReservation) -> CoreResult<BookingRecord>;

    async fn get_booking(&self, booking_id: Uuid) -> CoreResult<Option<BookingRecord>>;

    /// Locks the booking, applies [`crate::booking::Booking::apply_payment`]
    /// and, on a failed payment, releases the seats.
    async fn apply_payment(
        &self,
        booking_id: Uuid,
        signal: &PaymentSignal,
        now: DateTime<Utc>,
    ) -> CoreResult<BookingRecord>;

    /// Ids of Pending bookings whose hold ended at or before `now`, oldest first.
    async fn overdue_pending(&self, now: DateTime<Utc>, limit: i64) -> CoreResult<Vec<Uuid>>;

    /// Locks the booking and cancels it with
    /// [`crate::booking::CancellationReason::HoldExpired`]
    /// if it is still Pending and overdue, releasing exactly its seats.
    /// Returns `None` when there was nothing to expire.
    async fn expire_booking(&self, booking_id: Uuid, now: DateTime<Utc>) -> CoreResult<Option<BookingRecord>>;
}
