use busline_core::repository::ScheduleRepository;
use busline_core::schedule::{Amenity, BusType, PriceTier, ScheduleDetail, SeatPosition, SeatType};
use busline_core::{Clock, CoreError, CoreResult, Money};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::pricing::PricingEngine;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SeatLayoutView {
    pub schedule_id: Uuid,
    pub travel_date: NaiveDate,
    pub bus: BusSummary,
    pub seats: Vec<SeatView>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BusSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub bus_type: BusType,
    pub amenities: Vec<Amenity>,
    pub base_price: Money,
    pub total_seats: i32,
    pub available_seats: i32,
    pub booked_seats: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SeatView {
    pub number: String,
    #[serde(rename = "type")]
    pub seat_type: SeatType,
    pub position: SeatPosition,
    pub row: i32,
    pub column: i32,
    pub tier: PriceTier,
    pub price: Money,
    pub is_booked: bool,
}

/// Joins the template seats with the date's occupancy. Seats come out in
/// row, then column order.
pub fn build_layout(detail: &ScheduleDetail, booked: &HashSet<String>) -> SeatLayoutView {
    let pricing = PricingEngine::for_schedule(&detail.schedule);

    let mut seats: Vec<SeatView> = detail
        .seats
        .iter()
        .map(|seat| SeatView {
            number: seat.seat_number.clone(),
            seat_type: seat.seat_type,
            position: seat.position,
            row: seat.row,
            column: seat.column,
            tier: seat.price_tier,
            price: pricing.price(seat),
            is_booked: booked.contains(&seat.seat_number),
        })
        .collect();
    seats.sort_by(|a, b| (a.row, a.column).cmp(&(b.row, b.column)));

    let booked_seats = seats.iter().filter(|s| s.is_booked).count() as i32;
    let schedule = &detail.schedule;

    SeatLayoutView {
        schedule_id: schedule.id,
        travel_date: detail.travel_date,
        bus: BusSummary {
            name: schedule.bus_name.clone(),
            bus_type: schedule.bus_type,
            amenities: schedule.amenities.clone(),
            base_price: schedule.base_price,
            total_seats: schedule.total_seats,
            available_seats: detail.available_seats,
            booked_seats,
        },
        seats,
    }
}

pub struct SeatLayoutService {
    schedules: Arc<dyn ScheduleRepository>,
    clock: Arc<dyn Clock>,
}

impl SeatLayoutService {
    pub fn new(schedules: Arc<dyn ScheduleRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { schedules, clock }
    }

    #[tracing::instrument(skip(self))]
    pub async fn seat_layout(&self, schedule_id: Uuid, travel_date: NaiveDate) -> CoreResult<SeatLayoutView> {
        if travel_date < self.clock.today() {
            return Err(CoreError::ValidationError(format!("travel date {} is in the past", travel_date)));
        }

        let detail = self
            .schedules
            .schedule_detail(schedule_id, travel_date)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("schedule {} on {}", schedule_id, travel_date)))?;

        let booked = self.schedules.booked_seat_numbers(schedule_id, travel_date).await?;
        Ok(build_layout(&detail, &booked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use busline_core::booking::{NewReservation, Passenger, PricedSeat};
    use busline_core::repository::BookingRepository;
    use busline_core::ManualClock;
    use busline_store::memory::{demo_schedule, InMemoryStore};
    use chrono::{Duration, TimeZone, Utc};

    #[tokio::test]
    async fn test_layout_flags_booked_seats_for_exact_date() {
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 8, 0, 0).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        let other_date = NaiveDate::from_ymd_opt(2026, 10, 21).unwrap();
        let seed = demo_schedule(&[date, other_date]);
        let schedule_id = seed.schedule.id;
        let boarding = seed.stops[0].id;
        let dropping = seed.stops[2].id;

        let store = Arc::new(InMemoryStore::new());
        store.add_schedule(seed).await;

        store
            .commit_reservation(&NewReservation {
                pnr: "LAYOUT01".to_string(),
                customer_id: Uuid::new_v4(),
                schedule_id,
                travel_date: date,
                boarding_stop_id: boarding,
                dropping_stop_id: dropping,
                seats: vec![PricedSeat {
                    seat_number: "A2".to_string(),
                    passenger: Passenger { name: "Asha".to_string(), age: Some(31), gender: None },
                    price: Money::from_cents(12600),
                }],
                created_at: now,
                hold_expires_at: now + Duration::minutes(10),
            })
            .await
            .unwrap();

        let service = SeatLayoutService::new(store.clone(), Arc::new(ManualClock::new(now)));

        let layout = service.seat_layout(schedule_id, date).await.unwrap();
        assert_eq!(layout.bus.booked_seats, 1);
        assert_eq!(layout.bus.available_seats, layout.bus.total_seats - 1);
        let a2 = layout.seats.iter().find(|s| s.number == "A2").unwrap();
        assert!(a2.is_booked);
        assert_eq!(layout.seats.iter().filter(|s| s.is_booked).count(), 1);

        let next_day = service.seat_layout(schedule_id, other_date).await.unwrap();
        assert_eq!(next_day.bus.booked_seats, 0);
        assert!(next_day.seats.iter().all(|s| !s.is_booked));
    }

    #[tokio::test]
    async fn test_layout_prices_each_seat() {
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 8, 0, 0).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        let seed = demo_schedule(&[date]);
        let schedule_id = seed.schedule.id;
        let store = Arc::new(InMemoryStore::new());
        store.add_schedule(seed).await;

        let service = SeatLayoutService::new(store, Arc::new(ManualClock::new(now)));
        let layout = service.seat_layout(schedule_id, date).await.unwrap();

        // AC bus, base 100.00, WiFi: seaters 126.00, premium seaters 151.20
        let a1 = layout.seats.iter().find(|s| s.number == "A1").unwrap();
        assert_eq!(a1.price, Money::from_cents(12600));
        let p1 = layout.seats.iter().find(|s| s.tier == PriceTier::Premium).unwrap();
        assert_eq!(p1.price, Money::from_cents(15120));

        let rows: Vec<(i32, i32)> = layout.seats.iter().map(|s| (s.row, s.column)).collect();
        let mut sorted = rows.clone();
        sorted.sort();
        assert_eq!(rows, sorted);
    }

    #[tokio::test]
    async fn test_layout_rejects_past_date_and_unknown_schedule() {
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 8, 0, 0).unwrap();
        let store = Arc::new(InMemoryStore::new());
        let service = SeatLayoutService::new(store, Arc::new(ManualClock::new(now)));

        let past = service
            .seat_layout(Uuid::new_v4(), NaiveDate::from_ymd_opt(2026, 10, 13).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(past, CoreError::ValidationError(_)));

        let missing = service
            .seat_layout(Uuid::new_v4(), NaiveDate::from_ymd_opt(2026, 10, 15).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(missing, CoreError::NotFound(_)));
    }
}
