use async_trait::async_trait;
use busline_core::repository::ScheduleRepository;
use busline_core::schedule::{Amenity, RouteStop, Schedule, ScheduleDetail, SeatLayoutDetail};
use busline_core::search::ScheduleSummary;
use busline_core::{CoreResult, Money};
use chrono::{NaiveDate, NaiveTime};
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use crate::db_err;

pub struct PgScheduleRepository {
    pool: PgPool,
}

impl PgScheduleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SCHEDULE_SELECT: &str = r#"
    SELECT s.id, s.bus_id, s.route_id,
           b.name AS bus_name, v.name AS vendor_name, b.bus_type, b.amenities,
           s.base_price_cents, b.total_seats,
           r.source AS route_source, r.destination AS route_destination,
           s.departure_time, s.arrival_time,
           sd.available_seats
    FROM schedules s
    JOIN schedule_dates sd ON sd.schedule_id = s.id
    JOIN buses b ON b.id = s.bus_id
    JOIN vendors v ON v.id = b.vendor_id
    JOIN routes r ON r.id = s.route_id
"#;

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: Uuid,
    bus_id: Uuid,
    route_id: Uuid,
    bus_name: String,
    vendor_name: String,
    bus_type: String,
    amenities: Vec<String>,
    base_price_cents: i64,
    total_seats: i32,
    route_source: String,
    route_destination: String,
    departure_time: NaiveTime,
    arrival_time: NaiveTime,
    available_seats: i32,
}

impl ScheduleRow {
    fn into_schedule(self) -> CoreResult<(Schedule, i32)> {
        let amenities = self
            .amenities
            .iter()
            .map(|a| a.parse::<Amenity>())
            .collect::<CoreResult<Vec<_>>>()?;
        let schedule = Schedule {
            id: self.id,
            bus_id: self.bus_id,
            route_id: self.route_id,
            bus_name: self.bus_name,
            vendor_name: self.vendor_name,
            bus_type: self.bus_type.parse()?,
            amenities,
            base_price: Money::from_cents(self.base_price_cents),
            total_seats: self.total_seats,
            route_source: self.route_source,
            route_destination: self.route_destination,
            departure_time: self.departure_time,
            arrival_time: self.arrival_time,
        };
        Ok((schedule, self.available_seats))
    }
}

#[derive(sqlx::FromRow)]
struct StopRow {
    id: Uuid,
    route_id: Uuid,
    place: String,
    order_number: i32,
    arrival_time: Option<NaiveTime>,
    departure_time: Option<NaiveTime>,
}

impl From<StopRow> for RouteStop {
    fn from(row: StopRow) -> Self {
        RouteStop {
            id: row.id,
            route_id: row.route_id,
            place: row.place,
            order_number: row.order_number,
            arrival_time: row.arrival_time,
            departure_time: row.departure_time,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    seat_number: String,
    seat_type: String,
    position: String,
    row_number: i32,
    column_number: i32,
    price_tier: String,
}

impl SeatRow {
    fn into_detail(self) -> CoreResult<SeatLayoutDetail> {
        Ok(SeatLayoutDetail {
            seat_number: self.seat_number,
            seat_type: self.seat_type.parse()?,
            position: self.position.parse()?,
            row: self.row_number,
            column: self.column_number,
            price_tier: self.price_tier.parse()?,
        })
    }
}

#[async_trait]
impl ScheduleRepository for PgScheduleRepository {
    async fn find_schedules(
        &self,
        source: &str,
        destination: &str,
        travel_date: NaiveDate,
    ) -> CoreResult<Vec<ScheduleSummary>> {
        let sql = format!(
            r#"{SCHEDULE_SELECT}
            WHERE sd.travel_date = $3
              AND EXISTS (
                  SELECT 1
                  FROM route_stops a
                  JOIN route_stops d ON d.route_id = a.route_id AND d.order_number > a.order_number
                  WHERE a.route_id = s.route_id
                    AND LOWER(a.place) = LOWER($1)
                    AND LOWER(d.place) = LOWER($2)
              )"#
        );

        let rows = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(source.trim())
            .bind(destination.trim())
            .bind(travel_date)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter()
            .map(|row| {
                let (schedule, available) = row.into_schedule()?;
                Ok(ScheduleSummary::new(&schedule, travel_date, available))
            })
            .collect()
    }

    async fn schedule_detail(
        &self,
        schedule_id: Uuid,
        travel_date: NaiveDate,
    ) -> CoreResult<Option<ScheduleDetail>> {
        let sql = format!("{SCHEDULE_SELECT} WHERE s.id = $1 AND sd.travel_date = $2");
        let row = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(schedule_id)
            .bind(travel_date)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let (schedule, available_seats) = row.into_schedule()?;

        let stops = sqlx::query_as::<_, StopRow>(
            r#"
            SELECT id, route_id, place, order_number, arrival_time, departure_time
            FROM route_stops
            WHERE route_id = $1
            ORDER BY order_number
            "#,
        )
        .bind(schedule.route_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(RouteStop::from)
        .collect();

        let seats = sqlx::query_as::<_, SeatRow>(
            r#"
            SELECT d.seat_number, d.seat_type, d.position, d.row_number, d.column_number, d.price_tier
            FROM seat_layout_details d
            JOIN buses b ON b.layout_template_id = d.template_id
            WHERE b.id = $1
            ORDER BY d.row_number, d.column_number
            "#,
        )
        .bind(schedule.bus_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(SeatRow::into_detail)
        .collect::<CoreResult<Vec<_>>>()?;

        Ok(Some(ScheduleDetail { schedule, travel_date, available_seats, stops, seats }))
    }

    async fn booked_seat_numbers(
        &self,
        schedule_id: Uuid,
        travel_date: NaiveDate,
    ) -> CoreResult<HashSet<String>> {
        let taken: Vec<String> = sqlx::query_scalar(
            "SELECT seat_number FROM booked_seats WHERE schedule_id = $1 AND travel_date = $2 AND is_active",
        )
        .bind(schedule_id)
        .bind(travel_date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(taken.into_iter().collect())
    }
}
