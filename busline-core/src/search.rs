use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

use crate::schedule::{Amenity, BusType, Schedule};
use crate::{CoreError, CoreResult, Money};

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSearchRequest {
    pub source: String,
    pub destination: String,
    pub travel_date: NaiveDate,
    #[serde(flatten)]
    pub filters: SearchFilters,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortKey {
    #[default]
    DepartureAsc,
    DepartureDesc,
    PriceAsc,
    PriceDesc,
    Duration,
    SeatsAvailable,
}

/// Optional narrowing of a search. Empty sets mean "any".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub bus_types: Vec<BusType>,
    /// A schedule must offer every listed amenity.
    pub amenities: Vec<Amenity>,
    pub departure_from: Option<NaiveTime>,
    pub departure_to: Option<NaiveTime>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub sort: SortKey,
}

impl SearchFilters {
    pub fn validate(&self) -> CoreResult<()> {
        if let (Some(from), Some(to)) = (self.departure_from, self.departure_to) {
            if from > to {
                return Err(CoreError::ValidationError(format!(
                    "departure window start {} is after its end {}",
                    from, to
                )));
            }
        }
        for bound in [self.min_price, self.max_price].into_iter().flatten() {
            if bound.is_negative() {
                return Err(CoreError::ValidationError("price bounds must not be negative".to_string()));
            }
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(CoreError::ValidationError(format!(
                    "minimum price {} is above maximum price {}",
                    min, max
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, schedule: &ScheduleSummary) -> bool {
        if !self.bus_types.is_empty() && !self.bus_types.contains(&schedule.bus_type) {
            return false;
        }
        if !self.amenities.iter().all(|a| schedule.amenities.contains(a)) {
            return false;
        }
        if self.departure_from.is_some_and(|from| schedule.departure_time < from) {
            return false;
        }
        if self.departure_to.is_some_and(|to| schedule.departure_time > to) {
            return false;
        }
        if self.min_price.is_some_and(|min| schedule.base_price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| schedule.base_price > max) {
            return false;
        }
        true
    }

    /// Filters then sorts in place. Ties fall back to departure time, then id,
    /// so results are stable across calls.
    pub fn apply(&self, schedules: Vec<ScheduleSummary>) -> Vec<ScheduleSummary> {
        let mut kept: Vec<ScheduleSummary> = schedules.into_iter().filter(|s| self.matches(s)).collect();
        kept.sort_by(|a, b| compare(self.sort, a, b));
        kept
    }
}

fn compare(key: SortKey, a: &ScheduleSummary, b: &ScheduleSummary) -> Ordering {
    let primary = match key {
        SortKey::DepartureAsc => a.departure_time.cmp(&b.departure_time),
        SortKey::DepartureDesc => b.departure_time.cmp(&a.departure_time),
        SortKey::PriceAsc => a.base_price.cmp(&b.base_price),
        SortKey::PriceDesc => b.base_price.cmp(&a.base_price),
        SortKey::Duration => a.duration_minutes.cmp(&b.duration_minutes),
        SortKey::SeatsAvailable => b.available_seats.cmp(&a.available_seats),
    };
    primary
        .then_with(|| a.departure_time.cmp(&b.departure_time))
        .then_with(|| a.schedule_id.cmp(&b.schedule_id))
}

/// A schedule on a given date with bus, vendor and route fields flattened in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleSummary {
    pub schedule_id: Uuid,
    pub travel_date: NaiveDate,
    pub bus_name: String,
    pub bus_type: BusType,
    pub amenities: Vec<Amenity>,
    pub vendor_name: String,
    pub route_source: String,
    pub route_destination: String,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
    pub duration_minutes: i64,
    pub base_price: Money,
    pub total_seats: i32,
    pub available_seats: i32,
}

impl ScheduleSummary {
    pub fn new(schedule: &Schedule, travel_date: NaiveDate, available_seats: i32) -> Self {
        Self {
            schedule_id: schedule.id,
            travel_date,
            bus_name: schedule.bus_name.clone(),
            bus_type: schedule.bus_type,
            amenities: schedule.amenities.clone(),
            vendor_name: schedule.vendor_name.clone(),
            route_source: schedule.route_source.clone(),
            route_destination: schedule.route_destination.clone(),
            departure_time: schedule.departure_time,
            arrival_time: schedule.arrival_time,
            duration_minutes: schedule.duration_minutes(),
            base_price: schedule.base_price,
            total_seats: schedule.total_seats,
            available_seats,
        }
    }
}
