use anyhow::Context;
use busline_api::state::{booking_rules, AppState, AuthConfig, Backends};
use busline_api::{app, worker};
use busline_core::ticketing::TicketDispatcher;
use busline_core::SystemClock;
use busline_store::app_config::Config;
use busline_store::{DbClient, PgBookingRepository, PgCustomerDirectory, PgPlaceRegistry, PgScheduleRepository, RedisClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "busline_api=debug,busline_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Busline API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let bookings = Arc::new(PgBookingRepository::new(db.pool.clone()));
    let clock = Arc::new(SystemClock);
    let backends = Backends {
        schedules: Arc::new(PgScheduleRepository::new(db.pool.clone())),
        bookings: bookings.clone(),
        places: Arc::new(PgPlaceRegistry::new(db.pool.clone())),
        customers: Arc::new(PgCustomerDirectory::new(db.pool.clone())),
        tickets: ticket_dispatcher(&config)?,
        clock: clock.clone(),
    };

    let mut state = AppState::new(
        backends,
        booking_rules(&config.booking)?,
        AuthConfig { secret: config.auth.jwt_secret.clone() },
    );
    if let Some(redis) = &config.redis {
        let client = RedisClient::new(&redis.url).context("Invalid Redis URL")?;
        state = state.with_rate_limiter(Arc::new(client), config.rate_limit.clone());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = worker::spawn_expiry_worker(bookings, clock, &config.booking, shutdown_rx);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await?;

    tracing::info!("Shutting down");
    let _ = shutdown_tx.send(true);
    sweeper.await?;
    Ok(())
}

#[cfg(feature = "kafka")]
fn ticket_dispatcher(config: &Config) -> anyhow::Result<Arc<dyn TicketDispatcher>> {
    match &config.kafka {
        Some(kafka) => {
            let dispatcher = busline_store::KafkaTicketDispatcher::new(&kafka.brokers, kafka.ticket_topic.clone())
                .context("Failed to create Kafka producer")?;
            Ok(Arc::new(dispatcher))
        }
        None => Ok(Arc::new(busline_core::ticketing::LoggingTicketDispatcher)),
    }
}

#[cfg(not(feature = "kafka"))]
fn ticket_dispatcher(_config: &Config) -> anyhow::Result<Arc<dyn TicketDispatcher>> {
    Ok(Arc::new(busline_core::ticketing::LoggingTicketDispatcher))
}
