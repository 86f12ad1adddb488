//! Integration tests for the two stores, exercising the reservation
//! invariants end to end against real backends.
//!
//! Ignored by default: they need Postgres (`DATABASE_URL`) and Redis
//! (`REDIS_URL`) reachable, e.g. the docker-compose dev stack. Run with
//! `cargo test -p booking -- --ignored`.

use std::collections::HashMap;
use std::time::Duration;

use booking::config::Config;
use booking::domain::{DomainError, SeatStatus};
use booking::store::{connect_postgres, connect_redis, FlightRepo, SeatLockRepo, StoreError};
use sqlx::PgPool;

const TTL: Duration = Duration::from_secs(60);

async fn seed_flight(pool: &PgPool, flight_id: &str, seats: &[&str]) -> anyhow::Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS flights (
             id TEXT PRIMARY KEY,
             flight_number TEXT NOT NULL,
             origin TEXT NOT NULL,
             destination TEXT NOT NULL,
             departure_time TIMESTAMPTZ NOT NULL,
             arrival_time TIMESTAMPTZ NOT NULL,
             total_seats INT NOT NULL,
             available_seats INT NOT NULL,
             price_cents BIGINT NOT NULL,
             created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
             updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
         )",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS seats (
             id TEXT NOT NULL,
             flight_id TEXT NOT NULL REFERENCES flights(id),
             row_num INT NOT NULL,
             col TEXT NOT NULL,
             status TEXT NOT NULL DEFAULT 'available',
             order_id TEXT,
             created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
             updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
             PRIMARY KEY (flight_id, id)
         )",
    )
    .execute(pool)
    .await?;

    sqlx::query("DELETE FROM seats WHERE flight_id = $1")
        .bind(flight_id)
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM flights WHERE id = $1")
        .bind(flight_id)
        .execute(pool)
        .await?;

    sqlx::query(
        "INSERT INTO flights (id, flight_number, origin, destination, departure_time, \
                              arrival_time, total_seats, available_seats, price_cents) \
         VALUES ($1, 'IT100', 'AAA', 'BBB', NOW() + INTERVAL '1 day', \
                 NOW() + INTERVAL '1 day 2 hours', $2, $2, 10000)",
    )
    .bind(flight_id)
    .bind(seats.len() as i32)
    .execute(pool)
    .await?;

    for (i, seat) in seats.iter().enumerate() {
        sqlx::query(
            "INSERT INTO seats (id, flight_id, row_num, col) VALUES ($1, $2, $3, $4)",
        )
        .bind(seat)
        .bind(flight_id)
        .bind((i + 1) as i32)
        .bind("A")
        .execute(pool)
        .await?;
    }
    Ok(())
}

fn owned(seats: &[&str]) -> Vec<String> {
    seats.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
#[ignore = "requires local Postgres and Redis"]
async fn reserve_is_idempotent_and_release_is_too() -> anyhow::Result<()> {
    let cfg = Config::from_env();
    let pool = connect_postgres(&cfg.database.url).await?;
    let redis = connect_redis(&cfg.redis.url).await?;
    let flights = FlightRepo::new(pool.clone());
    let locks = SeatLockRepo::new(redis);

    let flight = "it-flight-idem";
    seed_flight(&pool, flight, &["1A", "1B"]).await?;
    let seats = owned(&["1A", "1B"]);

    locks.lock_seats(flight, &seats, "o1", TTL).await?;
    flights.mark_seats_reserved(flight, &seats, "o1").await?;

    // Re-execution with identical inputs is a no-op success.
    locks.lock_seats(flight, &seats, "o1", TTL).await?;
    flights.mark_seats_reserved(flight, &seats, "o1").await?;

    for seat in flights.find_seats(flight).await? {
        assert_eq!(seat.status, SeatStatus::Reserved);
        assert_eq!(seat.order_id.as_deref(), Some("o1"));
    }

    // Releasing twice leaves the same state as releasing once.
    locks.release_locks(flight, &seats, "o1").await?;
    flights.mark_seats_available(flight, &seats).await?;
    locks.release_locks(flight, &seats, "o1").await?;
    flights.mark_seats_available(flight, &seats).await?;

    for seat in flights.find_seats(flight).await? {
        assert_eq!(seat.status, SeatStatus::Available);
        assert_eq!(seat.order_id, None);
    }
    assert_eq!(locks.locked_seats(flight).await?, HashMap::new());
    Ok(())
}

#[tokio::test]
#[ignore = "requires local Postgres and Redis"]
async fn foreign_holds_are_rejected_and_partial_reserves_roll_back() -> anyhow::Result<()> {
    let cfg = Config::from_env();
    let pool = connect_postgres(&cfg.database.url).await?;
    let redis = connect_redis(&cfg.redis.url).await?;
    let flights = FlightRepo::new(pool.clone());
    let locks = SeatLockRepo::new(redis);

    let flight = "it-flight-conflict";
    seed_flight(&pool, flight, &["1A", "1B", "2A"]).await?;

    locks.lock_seats(flight, &owned(&["1B"]), "o1", TTL).await?;
    flights
        .mark_seats_reserved(flight, &owned(&["1B"]), "o1")
        .await?;

    // A second order trying to take 1A+1B must hit the lock on 1B.
    let err = locks
        .lock_seats(flight, &owned(&["1A", "1B"]), "o2", TTL)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Domain(DomainError::SeatAlreadyLocked { .. })
    ));

    // Even bypassing the lock store, the row gate rejects and rolls back the
    // partial set so 1A stays sellable.
    let err = flights
        .mark_seats_reserved(flight, &owned(&["1A", "1B"]), "o2")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Domain(DomainError::SeatUnavailable { .. })
    ));

    let seats = flights.find_seats(flight).await?;
    let seat_1a = seats.iter().find(|s| s.id == "1A").unwrap();
    assert_eq!(seat_1a.status, SeatStatus::Available);
    assert_eq!(seat_1a.order_id, None);
    let seat_1b = seats.iter().find(|s| s.id == "1B").unwrap();
    assert_eq!(seat_1b.order_id.as_deref(), Some("o1"));
    Ok(())
}

#[tokio::test]
#[ignore = "requires local Postgres and Redis"]
async fn booking_settles_the_counter_exactly_once() -> anyhow::Result<()> {
    let cfg = Config::from_env();
    let pool = connect_postgres(&cfg.database.url).await?;
    let flights = FlightRepo::new(pool.clone());

    let flight = "it-flight-book";
    seed_flight(&pool, flight, &["1A", "1B", "2A"]).await?;
    let seats = owned(&["1A", "1B"]);

    flights.mark_seats_reserved(flight, &seats, "o1").await?;
    flights.book_seats(flight, &seats, "o1").await?;
    // Re-execution after commit must not decrement again.
    flights.book_seats(flight, &seats, "o1").await?;

    let row = flights.find_by_id(flight).await?;
    assert_eq!(row.available_seats, 1);
    for seat in flights.find_seats(flight).await? {
        if seats.contains(&seat.id) {
            assert_eq!(seat.status, SeatStatus::Booked);
            assert_eq!(seat.order_id.as_deref(), Some("o1"));
        }
    }
    Ok(())
}
