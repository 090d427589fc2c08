use busline_core::repository::ScheduleRepository;
use busline_core::schedule::{RouteStop, ScheduleDetail, SeatLayoutDetail};
use busline_core::{CoreError, CoreResult};
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

/// A validated seat/stop choice, carrying what pricing and the commit need.
#[derive(Debug, Clone)]
pub struct SeatSelection {
    pub detail: ScheduleDetail,
    pub boarding: RouteStop,
    pub dropping: RouteStop,
    /// Template seats in the order they were requested.
    pub seats: Vec<SeatLayoutDetail>,
}

/// Both stops must be on the schedule's route, boarding strictly first.
pub fn check_stops(detail: &ScheduleDetail, boarding_stop_id: Uuid, dropping_stop_id: Uuid) -> CoreResult<(RouteStop, RouteStop)> {
    if boarding_stop_id == dropping_stop_id {
        return Err(CoreError::InvalidStopSelection("boarding and dropping stops must differ".to_string()));
    }
    let boarding = detail
        .stop(boarding_stop_id)
        .ok_or_else(|| CoreError::InvalidStopSelection(format!("boarding stop {} is not on this route", boarding_stop_id)))?;
    let dropping = detail
        .stop(dropping_stop_id)
        .ok_or_else(|| CoreError::InvalidStopSelection(format!("dropping stop {} is not on this route", dropping_stop_id)))?;

    if boarding.order_number >= dropping.order_number {
        return Err(CoreError::InvalidStopSelection(format!(
            "boarding at {} (stop {}) does not precede dropping at {} (stop {})",
            boarding.place, boarding.order_number, dropping.place, dropping.order_number
        )));
    }
    Ok((boarding.clone(), dropping.clone()))
}

/// Resolves seat numbers against the bus template.
pub fn match_seats(detail: &ScheduleDetail, seat_numbers: &[String]) -> CoreResult<Vec<SeatLayoutDetail>> {
    let unknown: Vec<&str> = seat_numbers
        .iter()
        .filter(|n| detail.seat(n).is_none())
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(CoreError::ValidationError(format!(
            "seats not on this bus: {}",
            unknown.join(", ")
        )));
    }
    Ok(seat_numbers.iter().filter_map(|n| detail.seat(n).cloned()).collect())
}

/// Checks a seat/stop request against the schedule, in order: stops, seat
/// existence, then occupancy. The occupancy read is advisory; the commit
/// re-checks under lock.
pub struct SeatStopValidator {
    schedules: Arc<dyn ScheduleRepository>,
}

impl SeatStopValidator {
    pub fn new(schedules: Arc<dyn ScheduleRepository>) -> Self {
        Self { schedules }
    }

    #[tracing::instrument(skip(self, seat_numbers))]
    pub async fn validate(
        &self,
        schedule_id: Uuid,
        travel_date: NaiveDate,
        seat_numbers: &[String],
        boarding_stop_id: Uuid,
        dropping_stop_id: Uuid,
    ) -> CoreResult<SeatSelection> {
        if seat_numbers.is_empty() {
            return Err(CoreError::ValidationError("at least one seat is required".to_string()));
        }

        let detail = self
            .schedules
            .schedule_detail(schedule_id, travel_date)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("schedule {} on {}", schedule_id, travel_date)))?;

        let (boarding, dropping) = check_stops(&detail, boarding_stop_id, dropping_stop_id)?;
        let seats = match_seats(&detail, seat_numbers)?;

        let booked = self.schedules.booked_seat_numbers(schedule_id, travel_date).await?;
        let taken: Vec<String> = seat_numbers.iter().filter(|n| booked.contains(*n)).cloned().collect();
        if !taken.is_empty() {
            tracing::info!("Rejecting request, seats already booked: {}", taken.join(", "));
            return Err(CoreError::SeatsUnavailable(taken));
        }

        Ok(SeatSelection { detail, boarding, dropping, seats })
    }
}
