use async_trait::async_trait;
use busline_core::booking::{
    BookedSeat, Booking, BookingRecord, BookingSegment, BookingStatus, NewReservation, Passenger,
};
use busline_core::payment::PaymentSignal;
use busline_core::repository::BookingRepository;
use busline_core::{CoreError, CoreResult, Money};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db_err;

/// Bookings on Postgres.
///
/// Commits lock the `schedule_dates` row for the schedule and date, so
/// concurrent holds on one date run one at a time; the partial unique index
/// on active seats backs that up. Payment and expiry lock the booking row
/// first and touch `schedule_dates` second, which keeps the lock order
/// acyclic.
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    pnr: String,
    customer_id: Uuid,
    total_seats: i32,
    total_amount_cents: i64,
    status: String,
    cancellation_reason: Option<String>,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
    hold_expires_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> CoreResult<Booking> {
        Ok(Booking {
            id: self.id,
            pnr: self.pnr,
            customer_id: self.customer_id,
            total_seats: self.total_seats,
            total_amount: Money::from_cents(self.total_amount_cents),
            status: self.status.parse()?,
            cancellation_reason: self.cancellation_reason.map(|r| r.parse()).transpose()?,
            payment_reference: self.payment_reference,
            created_at: self.created_at,
            hold_expires_at: self.hold_expires_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SegmentRow {
    id: Uuid,
    booking_id: Uuid,
    schedule_id: Uuid,
    travel_date: NaiveDate,
    seats_booked: i32,
    amount_cents: i64,
    boarding_stop_id: Uuid,
    dropping_stop_id: Uuid,
}

impl From<SegmentRow> for BookingSegment {
    fn from(row: SegmentRow) -> Self {
        BookingSegment {
            id: row.id,
            booking_id: row.booking_id,
            schedule_id: row.schedule_id,
            travel_date: row.travel_date,
            seats_booked: row.seats_booked,
            amount: Money::from_cents(row.amount_cents),
            boarding_stop_id: row.boarding_stop_id,
            dropping_stop_id: row.dropping_stop_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    segment_id: Uuid,
    schedule_id: Uuid,
    travel_date: NaiveDate,
    seat_number: String,
    passenger_name: String,
    passenger_age: Option<i32>,
    passenger_gender: Option<String>,
    price_cents: i64,
    is_active: bool,
}

impl From<SeatRow> for BookedSeat {
    fn from(row: SeatRow) -> Self {
        BookedSeat {
            id: row.id,
            segment_id: row.segment_id,
            schedule_id: row.schedule_id,
            travel_date: row.travel_date,
            seat_number: row.seat_number,
            passenger: Passenger {
                name: row.passenger_name,
                age: row.passenger_age,
                gender: row.passenger_gender,
            },
            price: Money::from_cents(row.price_cents),
            is_active: row.is_active,
        }
    }
}

async fn fetch_record(
    conn: &mut PgConnection,
    booking_id: Uuid,
    for_update: bool,
) -> CoreResult<Option<BookingRecord>> {
    let mut sql = String::from(
        r#"
        SELECT id, pnr, customer_id, total_seats, total_amount_cents, status,
               cancellation_reason, payment_reference, created_at, hold_expires_at, updated_at
        FROM bookings
        WHERE id = $1
        "#,
    );
    if for_update {
        sql.push_str(" FOR UPDATE");
    }

    let Some(row) = sqlx::query_as::<_, BookingRow>(&sql)
        .bind(booking_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
    else {
        return Ok(None);
    };
    let booking = row.into_booking()?;

    let segments = sqlx::query_as::<_, SegmentRow>(
        r#"
        SELECT id, booking_id, schedule_id, travel_date, seats_booked, amount_cents,
               boarding_stop_id, dropping_stop_id
        FROM booking_segments
        WHERE booking_id = $1
        "#,
    )
    .bind(booking_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?
    .into_iter()
    .map(BookingSegment::from)
    .collect();

    let seats = sqlx::query_as::<_, SeatRow>(
        r#"
        SELECT bs.id, bs.segment_id, bs.schedule_id, bs.travel_date, bs.seat_number,
               bs.passenger_name, bs.passenger_age, bs.passenger_gender, bs.price_cents, bs.is_active
        FROM booked_seats bs
        JOIN booking_segments seg ON seg.id = bs.segment_id
        WHERE seg.booking_id = $1
        ORDER BY bs.seat_number
        "#,
    )
    .bind(booking_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?
    .into_iter()
    .map(BookedSeat::from)
    .collect();

    Ok(Some(BookingRecord { booking, segments, seats }))
}

async fn update_status(conn: &mut PgConnection, booking: &Booking) -> CoreResult<()> {
    sqlx::query(
        r#"
        UPDATE bookings
        SET status = $2, cancellation_reason = $3, payment_reference = $4, updated_at = $5
        WHERE id = $1
        "#,
    )
    .bind(booking.id)
    .bind(booking.status.as_str())
    .bind(booking.cancellation_reason.map(|r| r.as_str()))
    .bind(booking.payment_reference.as_deref())
    .bind(booking.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

/// Deactivates the record's live seats and credits each segment's date.
async fn release_seats(conn: &mut PgConnection, record: &mut BookingRecord) -> CoreResult<()> {
    for segment in &record.segments {
        let released = sqlx::query(
            "UPDATE booked_seats SET is_active = FALSE WHERE segment_id = $1 AND is_active",
        )
        .bind(segment.id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?
        .rows_affected() as i32;

        if released > 0 {
            sqlx::query(
                r#"
                UPDATE schedule_dates
                SET available_seats = available_seats + $3
                WHERE schedule_id = $1 AND travel_date = $2
                "#,
            )
            .bind(segment.schedule_id)
            .bind(segment.travel_date)
            .bind(released)
            .execute(&mut *conn)
            .await
            .map_err(db_err)?;
        }
    }
    for seat in &mut record.seats {
        seat.is_active = false;
    }
    Ok(())
}

/// Unique violations on insert mean another booking won a seat or the PNR
/// collided.
fn insert_err(e: sqlx::Error, reservation: &NewReservation) -> CoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            if db.constraint() == Some("bookings_pnr_key") {
                return CoreError::StorageError(format!("duplicate PNR {}", reservation.pnr));
            }
            warn!("Seat uniqueness backstop hit for schedule {}", reservation.schedule_id);
            return CoreError::SeatsUnavailable(reservation.seat_numbers());
        }
    }
    db_err(e)
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn commit_reservation(&self, reservation: &NewReservation) -> CoreResult<BookingRecord> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let available: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT available_seats FROM schedule_dates
            WHERE schedule_id = $1 AND travel_date = $2
            FOR UPDATE
            "#,
        )
        .bind(reservation.schedule_id)
        .bind(reservation.travel_date)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;
        let available = available.ok_or_else(|| {
            CoreError::NotFound(format!(
                "schedule {} on {}",
                reservation.schedule_id, reservation.travel_date
            ))
        })?;

        let requested = reservation.seat_numbers();
        let occupied: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT seat_number FROM booked_seats
            WHERE schedule_id = $1 AND travel_date = $2 AND is_active AND seat_number = ANY($3)
            "#,
        )
        .bind(reservation.schedule_id)
        .bind(reservation.travel_date)
        .bind(&requested)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;
        if !occupied.is_empty() {
            let taken = requested.into_iter().filter(|s| occupied.contains(s)).collect();
            return Err(CoreError::SeatsUnavailable(taken));
        }
        if available < reservation.seat_count() {
            return Err(CoreError::SeatsUnavailable(requested));
        }

        let record = reservation.to_record();
        let booking = &record.booking;
        sqlx::query(
            r#"
            INSERT INTO bookings (id, pnr, customer_id, total_seats, total_amount_cents, status,
                                  created_at, hold_expires_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.pnr)
        .bind(booking.customer_id)
        .bind(booking.total_seats)
        .bind(booking.total_amount.cents())
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .bind(booking.hold_expires_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| insert_err(e, reservation))?;

        for segment in &record.segments {
            sqlx::query(
                r#"
                INSERT INTO booking_segments (id, booking_id, schedule_id, travel_date, seats_booked,
                                              amount_cents, boarding_stop_id, dropping_stop_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(segment.id)
            .bind(segment.booking_id)
            .bind(segment.schedule_id)
            .bind(segment.travel_date)
            .bind(segment.seats_booked)
            .bind(segment.amount.cents())
            .bind(segment.boarding_stop_id)
            .bind(segment.dropping_stop_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        for seat in &record.seats {
            sqlx::query(
                r#"
                INSERT INTO booked_seats (id, segment_id, schedule_id, travel_date, seat_number,
                                          passenger_name, passenger_age, passenger_gender, price_cents, is_active)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE)
                "#,
            )
            .bind(seat.id)
            .bind(seat.segment_id)
            .bind(seat.schedule_id)
            .bind(seat.travel_date)
            .bind(&seat.seat_number)
            .bind(&seat.passenger.name)
            .bind(seat.passenger.age)
            .bind(seat.passenger.gender.as_deref())
            .bind(seat.price.cents())
            .execute(&mut *tx)
            .await
            .map_err(|e| insert_err(e, reservation))?;
        }

        sqlx::query(
            r#"
            UPDATE schedule_dates
            SET available_seats = available_seats - $3
            WHERE schedule_id = $1 AND travel_date = $2
            "#,
        )
        .bind(reservation.schedule_id)
        .bind(reservation.travel_date)
        .bind(reservation.seat_count())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        info!("Committed booking {} (PNR {})", record.booking.id, record.booking.pnr);
        Ok(record)
    }

    async fn get_booking(&self, booking_id: Uuid) -> CoreResult<Option<BookingRecord>> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        fetch_record(&mut conn, booking_id, false).await
    }

    async fn apply_payment(
        &self,
        booking_id: Uuid,
        signal: &PaymentSignal,
        now: DateTime<Utc>,
    ) -> CoreResult<BookingRecord> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let mut record = fetch_record(&mut tx, booking_id, true)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", booking_id)))?;

        let status = record.booking.apply_payment(signal, now)?;
        update_status(&mut tx, &record.booking).await?;
        if status == BookingStatus::Cancelled {
            release_seats(&mut tx, &mut record).await?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(record)
    }

    async fn overdue_pending(&self, now: DateTime<Utc>, limit: i64) -> CoreResult<Vec<Uuid>> {
        sqlx::query_scalar(
            r#"
            SELECT id FROM bookings
            WHERE status = $1 AND hold_expires_at <= $2
            ORDER BY hold_expires_at
            LIMIT $3
            "#,
        )
        .bind(BookingStatus::Pending.as_str())
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn expire_booking(&self, booking_id: Uuid, now: DateTime<Utc>) -> CoreResult<Option<BookingRecord>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let mut record = fetch_record(&mut tx, booking_id, true)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", booking_id)))?;

        if !record.booking.expire(now) {
            return Ok(None);
        }
        update_status(&mut tx, &record.booking).await?;
        release_seats(&mut tx, &mut record).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(Some(record))
    }
}
