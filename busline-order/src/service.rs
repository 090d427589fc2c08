use busline_catalog::PricingEngine;
use busline_core::booking::{BookingConfirmation, BookingRecord, BookingStatus, NewReservation, Passenger, PricedSeat};
use busline_core::identity::CustomerDirectory;
use busline_core::payment::PaymentSignal;
use busline_core::repository::{BookingRepository, ScheduleRepository};
use busline_core::ticketing::TicketDispatcher;
use busline_core::{Clock, CoreError, CoreResult};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::notify::spawn_ticket_dispatch;
use crate::pnr::PnrGenerator;
use crate::validator::SeatStopValidator;

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationRequest {
    pub schedule_id: Uuid,
    pub travel_date: NaiveDate,
    pub seat_numbers: Vec<String>,
    pub passengers: Vec<Passenger>,
    pub boarding_stop_id: Uuid,
    pub dropping_stop_id: Uuid,
}

impl ReservationRequest {
    /// Checks that need nothing but the request itself.
    pub fn check_shape(&self, max_seats: usize) -> CoreResult<()> {
        if self.seat_numbers.is_empty() {
            return Err(CoreError::ValidationError("at least one seat is required".to_string()));
        }
        if self.seat_numbers.len() != self.passengers.len() {
            return Err(CoreError::ValidationError(format!(
                "{} seats requested for {} passengers",
                self.seat_numbers.len(),
                self.passengers.len()
            )));
        }
        if self.seat_numbers.len() > max_seats {
            return Err(CoreError::ValidationError(format!(
                "at most {} seats per booking",
                max_seats
            )));
        }
        let mut seen = HashSet::new();
        for seat in &self.seat_numbers {
            if seat.trim().is_empty() {
                return Err(CoreError::ValidationError("seat number must not be blank".to_string()));
            }
            if !seen.insert(seat.as_str()) {
                return Err(CoreError::ValidationError(format!("seat {} requested twice", seat)));
            }
        }
        for passenger in &self.passengers {
            if passenger.name.trim().is_empty() {
                return Err(CoreError::ValidationError("passenger name must not be blank".to_string()));
            }
            if passenger.age.is_some_and(|age| age < 0) {
                return Err(CoreError::ValidationError("passenger age must not be negative".to_string()));
            }
        }
        if self.boarding_stop_id == self.dropping_stop_id {
            return Err(CoreError::ValidationError("boarding and dropping stops must differ".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BookingRules {
    pub hold_window: Duration,
    pub max_seats_per_booking: usize,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self { hold_window: Duration::minutes(10), max_seats_per_booking: 6 }
    }
}

/// Holds seats, applies payment results and reads bookings back.
pub struct BookingService {
    validator: SeatStopValidator,
    bookings: Arc<dyn BookingRepository>,
    customers: Arc<dyn CustomerDirectory>,
    tickets: Arc<dyn TicketDispatcher>,
    clock: Arc<dyn Clock>,
    pnrs: PnrGenerator,
    rules: BookingRules,
}

impl BookingService {
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        bookings: Arc<dyn BookingRepository>,
        customers: Arc<dyn CustomerDirectory>,
        tickets: Arc<dyn TicketDispatcher>,
        clock: Arc<dyn Clock>,
        rules: BookingRules,
    ) -> Self {
        Self {
            validator: SeatStopValidator::new(schedules),
            bookings,
            customers,
            tickets,
            clock,
            pnrs: PnrGenerator::new(),
            rules,
        }
    }

    /// Places a Pending hold on the requested seats.
    #[tracing::instrument(skip(self, request), fields(schedule_id = %request.schedule_id, date = %request.travel_date))]
    pub async fn reserve(&self, external_user_id: &str, request: &ReservationRequest) -> CoreResult<BookingConfirmation> {
        request.check_shape(self.rules.max_seats_per_booking)?;
        if request.travel_date < self.clock.today() {
            return Err(CoreError::ValidationError(format!(
                "travel date {} is in the past",
                request.travel_date
            )));
        }

        let customer_id = self.customers.resolve_customer(external_user_id).await?;

        let selection = self
            .validator
            .validate(
                request.schedule_id,
                request.travel_date,
                &request.seat_numbers,
                request.boarding_stop_id,
                request.dropping_stop_id,
            )
            .await?;

        let pricing = PricingEngine::for_schedule(&selection.detail.schedule);
        let seats = selection
            .seats
            .iter()
            .zip(&request.passengers)
            .map(|(seat, passenger)| PricedSeat {
                seat_number: seat.seat_number.clone(),
                passenger: passenger.clone(),
                price: pricing.price(seat),
            })
            .collect();

        let now = self.clock.now();
        let reservation = NewReservation {
            pnr: self.pnrs.generate(),
            customer_id,
            schedule_id: request.schedule_id,
            travel_date: request.travel_date,
            boarding_stop_id: selection.boarding.id,
            dropping_stop_id: selection.dropping.id,
            seats,
            created_at: now,
            hold_expires_at: now + self.rules.hold_window,
        };

        let record = self.bookings.commit_reservation(&reservation).await?;
        info!(
            "Held {} seats under PNR {} until {}",
            record.booking.total_seats, record.booking.pnr, record.booking.hold_expires_at
        );

        Ok(BookingConfirmation {
            pnr: record.booking.pnr.clone(),
            booking_id: record.booking.id,
            total_amount: record.booking.total_amount,
            seat_numbers: reservation.seat_numbers(),
            boarding_point: selection.boarding.place.clone(),
            boarding_time: selection.boarding.departure_time.or(selection.boarding.arrival_time),
            dropping_point: selection.dropping.place.clone(),
            dropping_time: selection.dropping.arrival_time.or(selection.dropping.departure_time),
            reservation_expiry_time: record.booking.hold_expires_at,
        })
    }

    /// Applies a payment result. A confirmed booking has its ticket sent in
    /// the background; a failed payment releases the seats.
    #[tracing::instrument(skip(self, signal), fields(reference = %signal.payment_reference_id, success = signal.success))]
    pub async fn confirm(&self, booking_id: Uuid, signal: &PaymentSignal) -> CoreResult<BookingRecord> {
        let record = self.bookings.apply_payment(booking_id, signal, self.clock.now()).await?;

        match record.booking.status {
            BookingStatus::Confirmed => {
                info!("Booking {} confirmed", record.booking.pnr);
                spawn_ticket_dispatch(self.tickets.clone(), record.clone());
            }
            _ => info!("Payment failed for {}, seats released", record.booking.pnr),
        }
        Ok(record)
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> CoreResult<BookingRecord> {
        self.bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", booking_id)))
    }
}
