//! Process-local store with the same transactional semantics as the Postgres
//! repositories. One mutex guards all state, so each trait method is atomic.

use async_trait::async_trait;
use busline_core::booking::{BookingRecord, BookingStatus, NewReservation};
use busline_core::payment::PaymentSignal;
use busline_core::places::PlaceRegistry;
use busline_core::repository::{BookingRepository, ScheduleRepository};
use busline_core::schedule::{
    route_serves, Amenity, BusType, PriceTier, RouteStop, Schedule, ScheduleDetail, SeatLayoutDetail,
    SeatPosition, SeatType,
};
use busline_core::search::ScheduleSummary;
use busline_core::{CoreError, CoreResult, Money};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

/// A schedule plus the dates it operates on. Every date starts fully available.
#[derive(Debug, Clone)]
pub struct ScheduleSeed {
    pub schedule: Schedule,
    pub stops: Vec<RouteStop>,
    pub seats: Vec<SeatLayoutDetail>,
    pub dates: Vec<NaiveDate>,
}

/// Call counts, for asserting which storage paths a request reached.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub schedule_reads: u64,
    pub seat_lookups: u64,
    pub commits: u64,
}

struct StoredSchedule {
    schedule: Schedule,
    stops: Vec<RouteStop>,
    seats: Vec<SeatLayoutDetail>,
}

#[derive(Default)]
struct State {
    schedules: HashMap<Uuid, StoredSchedule>,
    availability: HashMap<(Uuid, NaiveDate), i32>,
    bookings: HashMap<Uuid, BookingRecord>,
    pnrs: HashSet<String>,
    places: HashSet<String>,
    stats: StoreStats,
}

impl State {
    fn occupied(&self, schedule_id: Uuid, travel_date: NaiveDate) -> HashSet<String> {
        self.bookings
            .values()
            .flat_map(|r| r.seats.iter())
            .filter(|s| s.is_active && s.schedule_id == schedule_id && s.travel_date == travel_date)
            .map(|s| s.seat_number.clone())
            .collect()
    }

    /// Marks the booking's seats inactive and returns them to the per-date counters.
    fn release(&mut self, record: &mut BookingRecord) {
        for seat in record.seats.iter_mut().filter(|s| s.is_active) {
            seat.is_active = false;
            if let Some(available) = self.availability.get_mut(&(seat.schedule_id, seat.travel_date)) {
                *available += 1;
            }
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_schedule(&self, seed: ScheduleSeed) {
        let mut state = self.state.lock().await;
        let total = seed.schedule.total_seats;
        for date in &seed.dates {
            state.availability.insert((seed.schedule.id, *date), total);
        }
        for stop in &seed.stops {
            state.places.insert(stop.place.trim().to_lowercase());
        }
        state.places.insert(seed.schedule.route_source.trim().to_lowercase());
        state.places.insert(seed.schedule.route_destination.trim().to_lowercase());
        state.schedules.insert(
            seed.schedule.id,
            StoredSchedule { schedule: seed.schedule, stops: seed.stops, seats: seed.seats },
        );
    }

    pub async fn available_seats(&self, schedule_id: Uuid, travel_date: NaiveDate) -> Option<i32> {
        self.state.lock().await.availability.get(&(schedule_id, travel_date)).copied()
    }

    pub async fn stats(&self) -> StoreStats {
        self.state.lock().await.stats
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryStore {
    async fn find_schedules(
        &self,
        source: &str,
        destination: &str,
        travel_date: NaiveDate,
    ) -> CoreResult<Vec<ScheduleSummary>> {
        let mut state = self.state.lock().await;
        state.stats.schedule_reads += 1;

        let found = state
            .schedules
            .values()
            .filter(|s| route_serves(&s.stops, source, destination))
            .filter_map(|s| {
                state
                    .availability
                    .get(&(s.schedule.id, travel_date))
                    .map(|available| ScheduleSummary::new(&s.schedule, travel_date, *available))
            })
            .collect();
        Ok(found)
    }

    async fn schedule_detail(
        &self,
        schedule_id: Uuid,
        travel_date: NaiveDate,
    ) -> CoreResult<Option<ScheduleDetail>> {
        let mut state = self.state.lock().await;
        state.stats.schedule_reads += 1;

        let Some(available_seats) = state.availability.get(&(schedule_id, travel_date)).copied() else {
            return Ok(None);
        };
        Ok(state.schedules.get(&schedule_id).map(|s| {
            let mut stops = s.stops.clone();
            stops.sort_by_key(|stop| stop.order_number);
            ScheduleDetail {
                schedule: s.schedule.clone(),
                travel_date,
                available_seats,
                stops,
                seats: s.seats.clone(),
            }
        }))
    }

    async fn booked_seat_numbers(
        &self,
        schedule_id: Uuid,
        travel_date: NaiveDate,
    ) -> CoreResult<HashSet<String>> {
        let mut state = self.state.lock().await;
        state.stats.seat_lookups += 1;
        Ok(state.occupied(schedule_id, travel_date))
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn commit_reservation(&self, reservation: &NewReservation) -> CoreResult<BookingRecord> {
        let mut state = self.state.lock().await;
        state.stats.commits += 1;

        let key = (reservation.schedule_id, reservation.travel_date);
        let available = *state.availability.get(&key).ok_or_else(|| {
            CoreError::NotFound(format!(
                "schedule {} on {}",
                reservation.schedule_id, reservation.travel_date
            ))
        })?;

        let occupied = state.occupied(reservation.schedule_id, reservation.travel_date);
        let taken: Vec<String> = reservation
            .seat_numbers()
            .into_iter()
            .filter(|s| occupied.contains(s))
            .collect();
        if !taken.is_empty() {
            return Err(CoreError::SeatsUnavailable(taken));
        }
        if available < reservation.seat_count() {
            return Err(CoreError::SeatsUnavailable(reservation.seat_numbers()));
        }
        if state.pnrs.contains(&reservation.pnr) {
            return Err(CoreError::StorageError(format!("duplicate PNR {}", reservation.pnr)));
        }

        let record = reservation.to_record();
        state.availability.insert(key, available - reservation.seat_count());
        state.pnrs.insert(record.booking.pnr.clone());
        state.bookings.insert(record.booking.id, record.clone());
        Ok(record)
    }

    async fn get_booking(&self, booking_id: Uuid) -> CoreResult<Option<BookingRecord>> {
        Ok(self.state.lock().await.bookings.get(&booking_id).cloned())
    }

    async fn apply_payment(
        &self,
        booking_id: Uuid,
        signal: &PaymentSignal,
        now: DateTime<Utc>,
    ) -> CoreResult<BookingRecord> {
        let mut state = self.state.lock().await;
        let mut record = state
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", booking_id)))?;

        let status = record.booking.apply_payment(signal, now)?;
        if status == BookingStatus::Cancelled {
            state.release(&mut record);
        }
        state.bookings.insert(booking_id, record.clone());
        Ok(record)
    }

    async fn overdue_pending(&self, now: DateTime<Utc>, limit: i64) -> CoreResult<Vec<Uuid>> {
        let state = self.state.lock().await;
        let mut overdue: Vec<(DateTime<Utc>, Uuid)> = state
            .bookings
            .values()
            .filter(|r| r.booking.status == BookingStatus::Pending && r.booking.is_hold_elapsed(now))
            .map(|r| (r.booking.hold_expires_at, r.booking.id))
            .collect();
        overdue.sort();
        Ok(overdue
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|(_, id)| id)
            .collect())
    }

    async fn expire_booking(&self, booking_id: Uuid, now: DateTime<Utc>) -> CoreResult<Option<BookingRecord>> {
        let mut state = self.state.lock().await;
        let Some(mut record) = state.bookings.get(&booking_id).cloned() else {
            return Err(CoreError::NotFound(format!("booking {}", booking_id)));
        };
        if !record.booking.expire(now) {
            return Ok(None);
        }
        state.release(&mut record);
        state.bookings.insert(booking_id, record.clone());
        Ok(Some(record))
    }
}

#[async_trait]
impl PlaceRegistry for InMemoryStore {
    async fn place_exists(&self, name: &str) -> CoreResult<bool> {
        Ok(self.state.lock().await.places.contains(&name.trim().to_lowercase()))
    }
}

/// Sample overnight AC schedule Bengaluru -> Vellore -> Chennai with ten
/// seaters (two of them premium) and a base fare of 100.00. Every call gets
/// fresh ids.
pub fn demo_schedule(dates: &[NaiveDate]) -> ScheduleSeed {
    let route_id = Uuid::new_v4();
    let time = |h: u32, m: u32| NaiveTime::from_hms_opt(h, m, 0);

    let schedule = Schedule {
        id: Uuid::new_v4(),
        bus_id: Uuid::new_v4(),
        route_id,
        bus_name: "Cauvery Express".to_string(),
        vendor_name: "Kaveri Travels".to_string(),
        bus_type: BusType::Ac,
        amenities: vec![Amenity::Wifi],
        base_price: Money::from_major(100),
        total_seats: 10,
        route_source: "Bengaluru".to_string(),
        route_destination: "Chennai".to_string(),
        departure_time: time(21, 0).unwrap_or_default(),
        arrival_time: time(3, 30).unwrap_or_default(),
    };

    let stops = [
        ("Bengaluru", None, time(21, 0)),
        ("Vellore", time(0, 30), time(0, 40)),
        ("Chennai", time(3, 30), None),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (place, arrival_time, departure_time))| RouteStop {
        id: Uuid::new_v4(),
        route_id,
        place: place.to_string(),
        order_number: i as i32 + 1,
        arrival_time,
        departure_time,
    })
    .collect();

    let mut seats = Vec::new();
    for (row, prefix) in [(1, "A"), (2, "B")] {
        for column in 1..=4 {
            let position = if column == 1 || column == 4 { SeatPosition::Window } else { SeatPosition::Aisle };
            seats.push(SeatLayoutDetail {
                seat_number: format!("{}{}", prefix, column),
                seat_type: SeatType::Seater,
                position,
                row,
                column,
                price_tier: PriceTier::Base,
            });
        }
    }
    for (number, column) in [("P1", 1), ("P2", 4)] {
        seats.push(SeatLayoutDetail {
            seat_number: number.to_string(),
            seat_type: SeatType::Seater,
            position: SeatPosition::Window,
            row: 3,
            column,
            price_tier: PriceTier::Premium,
        });
    }

    ScheduleSeed { schedule, stops, seats, dates: dates.to_vec() }
}
