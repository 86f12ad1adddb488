//! Demo driver: books seats on a flight, pays with the always-approve test
//! code and polls the status projection until the order settles.
//!
//! Usage: `client <flight-id> <seat> [<seat>...]`

use std::time::Duration;

use anyhow::bail;
use env_logger::Env;
use log::info;

use booking::client::BookingClient;
use booking::config::Config;
use booking::store::{connect_postgres, connect_redis};
use helpers::get_client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let Some(flight_id) = args.next() else {
        bail!("usage: client <flight-id> <seat> [<seat>...]");
    };
    let seats: Vec<String> = args.collect();
    if seats.is_empty() {
        bail!("at least one seat code is required");
    }

    let cfg = Config::from_env();
    let pool = connect_postgres(&cfg.database.url).await?;
    let redis = connect_redis(&cfg.redis.url).await?;
    let temporal = get_client(&cfg.temporal.address, &cfg.temporal.namespace).await?;
    let client = BookingClient::new(temporal, &cfg, pool, redis);

    let flight = client.flight_with_seats(&flight_id).await?;
    println!(
        "Flight {} {} -> {}: {} of {} seats available",
        flight.flight.flight_number,
        flight.flight.origin,
        flight.flight.destination,
        flight.flight.available_seats,
        flight.flight.total_seats
    );

    let created = client.create_order(&flight_id, seats).await?;
    println!(
        "Created order {} (workflow {}), hold expires at {}",
        created.order_id, created.workflow_id, created.expires_at
    );

    // Give the workflow a moment to reserve before paying.
    tokio::time::sleep(Duration::from_secs(1)).await;

    info!("submitting test payment code");
    client.submit_payment(&created.order_id, "99999").await?;

    loop {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let status = client.order_status(&created.order_id).await?;
        println!(
            "order {} status={} seats={:?} attempts={}",
            status.order_id, status.status, status.seats, status.payment_attempts
        );
        if status.status.is_terminal() {
            if let Some(last_error) = status.last_error {
                println!("last error: {last_error}");
            }
            break;
        }
    }
    Ok(())
}
