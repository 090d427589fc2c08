//! Seat-level pricing.
//!
//! Every multiplier is held as an exact integer over a fixed scale, so the
//! product is computed without floating point and rounded exactly once:
//! half away from zero, to the cent.

use busline_core::schedule::{Amenity, BusType, PriceTier, Schedule, SeatLayoutDetail, SeatType};
use busline_core::Money;
use std::collections::BTreeSet;

/// Tenths.
const TYPE_SCALE: i128 = 10;
/// Hundredths.
const AMENITY_SCALE: i128 = 100;
/// Tenths.
const SEAT_SCALE: i128 = 10;
/// Tenths.
const TIER_SCALE: i128 = 10;

fn type_multiplier(bus_type: BusType) -> i128 {
    match bus_type {
        BusType::Standard => 10,
        BusType::Ac => 12,
        BusType::Sleeper => 15,
        BusType::Volvo => 18,
        BusType::Luxury => 20,
    }
}

fn amenity_multiplier<'a>(amenities: impl IntoIterator<Item = &'a Amenity>) -> i128 {
    let distinct: BTreeSet<&Amenity> = amenities.into_iter().collect();
    AMENITY_SCALE
        + distinct
            .into_iter()
            .map(|a| match a {
                Amenity::Wifi | Amenity::Charging => 5,
                Amenity::Meals | Amenity::Entertainment => 10,
                Amenity::Blanket | Amenity::ReadingLight => 0,
            })
            .sum::<i128>()
}

fn seat_multiplier(seat_type: SeatType) -> i128 {
    match seat_type {
        SeatType::SleeperLower => 13,
        SeatType::SleeperUpper => 11,
        SeatType::SemiSleeper => 12,
        SeatType::Seater => 10,
    }
}

fn tier_multiplier(tier: PriceTier) -> i128 {
    match tier {
        PriceTier::Premium => 12,
        PriceTier::Luxury => 15,
        PriceTier::Base => 10,
    }
}

fn div_round_half_away(numerator: i128, denominator: i128) -> i128 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        -((-numerator + half) / denominator)
    }
}

/// `round(base × type × amenities × seat × tier, 2)`.
pub fn seat_price(
    base_price: Money,
    bus_type: BusType,
    amenities: &[Amenity],
    seat_type: SeatType,
    tier: PriceTier,
) -> Money {
    let numerator = base_price.cents() as i128
        * type_multiplier(bus_type)
        * amenity_multiplier(amenities)
        * seat_multiplier(seat_type)
        * tier_multiplier(tier);
    let denominator = TYPE_SCALE * AMENITY_SCALE * SEAT_SCALE * TIER_SCALE;
    let cents = div_round_half_away(numerator, denominator);
    Money::from_cents(i64::try_from(cents).unwrap_or(if cents < 0 { i64::MIN } else { i64::MAX }))
}

/// Prices seats of one schedule's bus.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    base_price: Money,
    bus_type: BusType,
    amenities: Vec<Amenity>,
}

impl PricingEngine {
    pub fn new(base_price: Money, bus_type: BusType, amenities: Vec<Amenity>) -> Self {
        Self { base_price, bus_type, amenities }
    }

    pub fn for_schedule(schedule: &Schedule) -> Self {
        Self::new(schedule.base_price, schedule.bus_type, schedule.amenities.clone())
    }

    pub fn price(&self, seat: &SeatLayoutDetail) -> Money {
        seat_price(self.base_price, self.bus_type, &self.amenities, seat.seat_type, seat.price_tier)
    }

    /// Sum of each seat's own price.
    pub fn total<'a>(&self, seats: impl IntoIterator<Item = &'a SeatLayoutDetail>) -> Money {
        seats.into_iter().map(|s| self.price(s)).sum()
    }
}
