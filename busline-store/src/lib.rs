pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod directory;
#[cfg(feature = "kafka")]
pub mod events;
pub mod memory;
pub mod redis_repo;
pub mod schedule_repo;

pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
pub use directory::{PgCustomerDirectory, PgPlaceRegistry};
#[cfg(feature = "kafka")]
pub use events::KafkaTicketDispatcher;
pub use memory::InMemoryStore;
pub use redis_repo::RedisClient;
pub use schedule_repo::PgScheduleRepository;

use busline_core::CoreError;

/// Maps a driver error onto the domain error. Unique violations surface as
/// storage errors here; callers that expect one map it themselves.
pub(crate) fn db_err(e: sqlx::Error) -> CoreError {
    tracing::error!("Database error: {}", e);
    CoreError::StorageError(e.to_string())
}
