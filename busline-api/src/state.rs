use busline_catalog::{ScheduleSearchService, SeatLayoutService};
use busline_core::identity::CustomerDirectory;
use busline_core::places::PlaceRegistry;
use busline_core::repository::{BookingRepository, ScheduleRepository};
use busline_core::ticketing::TicketDispatcher;
use busline_core::Clock;
use busline_order::{BookingRules, BookingService};
use busline_store::app_config::{BookingConfig, RateLimitConfig};
use busline_store::RedisClient;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

/// The storage and collaborator implementations the services run on.
pub struct Backends {
    pub schedules: Arc<dyn ScheduleRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub places: Arc<dyn PlaceRegistry>,
    pub customers: Arc<dyn CustomerDirectory>,
    pub tickets: Arc<dyn TicketDispatcher>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Clone)]
pub struct RateLimiter {
    pub redis: Arc<RedisClient>,
    pub config: RateLimitConfig,
}

#[derive(Clone)]
pub struct AppState {
    pub search: Arc<ScheduleSearchService>,
    pub layouts: Arc<SeatLayoutService>,
    pub bookings: Arc<BookingService>,
    pub customers: Arc<dyn CustomerDirectory>,
    pub auth: AuthConfig,
    pub rate_limiter: Option<RateLimiter>,
}

impl AppState {
    pub fn new(backends: Backends, rules: BookingRules, auth: AuthConfig) -> Self {
        let Backends { schedules, bookings, places, customers, tickets, clock } = backends;
        Self {
            search: Arc::new(ScheduleSearchService::new(schedules.clone(), places, clock.clone())),
            layouts: Arc::new(SeatLayoutService::new(schedules.clone(), clock.clone())),
            bookings: Arc::new(BookingService::new(
                schedules,
                bookings,
                customers.clone(),
                tickets,
                clock,
                rules,
            )),
            customers,
            auth,
            rate_limiter: None,
        }
    }

    pub fn with_rate_limiter(mut self, redis: Arc<RedisClient>, config: RateLimitConfig) -> Self {
        self.rate_limiter = Some(RateLimiter { redis, config });
        self
    }
}

pub fn booking_rules(config: &BookingConfig) -> anyhow::Result<BookingRules> {
    let hold_window = i64::try_from(config.hold_window_seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .filter(|window| *window > chrono::Duration::zero())
        .ok_or_else(|| anyhow::anyhow!("booking.hold_window_seconds out of range: {}", config.hold_window_seconds))?;

    Ok(BookingRules { hold_window, max_seats_per_booking: config.max_seats_per_booking })
}
