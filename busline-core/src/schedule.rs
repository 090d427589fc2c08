use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, Money};

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum using the
/// same SCREAMING_SNAKE_CASE names serde uses, so database text columns and
/// JSON agree.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(CoreError::ValidationError(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

pub(crate) use text_enum;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusType {
    Standard,
    Ac,
    Sleeper,
    Volvo,
    Luxury,
}

text_enum!(BusType {
    Standard => "STANDARD",
    Ac => "AC",
    Sleeper => "SLEEPER",
    Volvo => "VOLVO",
    Luxury => "LUXURY",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Amenity {
    Wifi,
    Charging,
    Meals,
    Entertainment,
    Blanket,
    ReadingLight,
}

text_enum!(Amenity {
    Wifi => "WIFI",
    Charging => "CHARGING",
    Meals => "MEALS",
    Entertainment => "ENTERTAINMENT",
    Blanket => "BLANKET",
    ReadingLight => "READING_LIGHT",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatType {
    Seater,
    SemiSleeper,
    SleeperLower,
    SleeperUpper,
}

text_enum!(SeatType {
    Seater => "SEATER",
    SemiSleeper => "SEMI_SLEEPER",
    SleeperLower => "SLEEPER_LOWER",
    SleeperUpper => "SLEEPER_UPPER",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceTier {
    Base,
    Premium,
    Luxury,
}

text_enum!(PriceTier {
    Base => "BASE",
    Premium => "PREMIUM",
    Luxury => "LUXURY",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatPosition {
    Window,
    Aisle,
    Middle,
}

text_enum!(SeatPosition {
    Window => "WINDOW",
    Aisle => "AISLE",
    Middle => "MIDDLE",
});

/// One bus running one route at fixed times. Per-date availability lives in
/// [`ScheduleDetail`] / [`crate::search::ScheduleSummary`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub bus_id: Uuid,
    pub route_id: Uuid,
    pub bus_name: String,
    pub vendor_name: String,
    pub bus_type: BusType,
    pub amenities: Vec<Amenity>,
    pub base_price: Money,
    pub total_seats: i32,
    pub route_source: String,
    pub route_destination: String,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
}

impl Schedule {
    /// Trip length in minutes; an arrival earlier than departure rolls over midnight.
    pub fn duration_minutes(&self) -> i64 {
        let minutes = (self.arrival_time - self.departure_time).num_minutes();
        if minutes < 0 {
            minutes + 24 * 60
        } else {
            minutes
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteStop {
    pub id: Uuid,
    pub route_id: Uuid,
    pub place: String,
    pub order_number: i32,
    pub arrival_time: Option<NaiveTime>,
    pub departure_time: Option<NaiveTime>,
}

/// A seat in the bus's reusable layout template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatLayoutDetail {
    pub seat_number: String,
    pub seat_type: SeatType,
    pub position: SeatPosition,
    pub row: i32,
    pub column: i32,
    pub price_tier: PriceTier,
}

/// Everything booking and seat-map code needs about a schedule on one date.
#[derive(Debug, Clone)]
pub struct ScheduleDetail {
    pub schedule: Schedule,
    pub travel_date: NaiveDate,
    pub available_seats: i32,
    pub stops: Vec<RouteStop>,
    pub seats: Vec<SeatLayoutDetail>,
}

impl ScheduleDetail {
    pub fn stop(&self, stop_id: Uuid) -> Option<&RouteStop> {
        self.stops.iter().find(|s| s.id == stop_id)
    }

    pub fn seat(&self, seat_number: &str) -> Option<&SeatLayoutDetail> {
        self.seats.iter().find(|s| s.seat_number == seat_number)
    }
}

/// True when the stops visit `source` strictly before `destination`.
/// Place names compare case-insensitively.
pub fn route_serves(stops: &[RouteStop], source: &str, destination: &str) -> bool {
    let order_of = |place: &str| -> Vec<i32> {
        stops
            .iter()
            .filter(|s| s.place.trim().eq_ignore_ascii_case(place.trim()))
            .map(|s| s.order_number)
            .collect()
    };
    let boarding = order_of(source);
    let alighting = order_of(destination);
    boarding.iter().any(|b| alighting.iter().any(|a| b < a))
}
