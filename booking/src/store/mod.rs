//! Storage backends: Postgres for authoritative rows, Redis for advisory
//! seat locks with TTL.

use std::time::Duration;

use log::info;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::domain::DomainError;

mod flight_repo;
mod order_repo;
mod seat_lock_repo;

pub use flight_repo::FlightRepo;
pub use order_repo::OrderRepo;
pub use seat_lock_repo::SeatLockRepo;

/// Errors surfaced by the repositories. `Domain` failures are business-rule
/// violations and never retryable; the rest are infrastructure trouble that
/// activity retry policies are allowed to absorb.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("lock store error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl StoreError {
    /// True when retrying the same call cannot succeed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StoreError::Domain(_))
    }
}

/// Open the Postgres pool and verify connectivity.
pub async fn connect_postgres(url: &str) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(25)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    info!("connected to Postgres");
    Ok(pool)
}

/// Open the Redis client and verify connectivity with a PING.
pub async fn connect_redis(url: &str) -> Result<redis::Client, StoreError> {
    let client = redis::Client::open(url)?;
    let mut conn = client.get_multiplexed_async_connection().await?;
    let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
    info!("connected to Redis");
    Ok(client)
}
