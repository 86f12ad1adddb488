//! Flights and seat rows. The conditional seat updates here are the
//! authoritative admission gate for reservations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{DomainError, Flight, Seat, SeatStatus};

use super::StoreError;

pub struct FlightRepo {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: String,
    flight_number: String,
    origin: String,
    destination: String,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    total_seats: i32,
    available_seats: i32,
    price_cents: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FlightRow> for Flight {
    fn from(r: FlightRow) -> Self {
        Flight {
            id: r.id,
            flight_number: r.flight_number,
            origin: r.origin,
            destination: r.destination,
            departure_time: r.departure_time,
            arrival_time: r.arrival_time,
            total_seats: r.total_seats,
            available_seats: r.available_seats,
            price_cents: r.price_cents,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: String,
    flight_id: String,
    row_num: i32,
    col: String,
    status: String,
    order_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SeatRow {
    fn into_seat(self) -> Result<Seat, StoreError> {
        let status = SeatStatus::parse(&self.status).ok_or_else(|| {
            StoreError::Database(sqlx::Error::Decode(
                format!("unknown seat status {:?}", self.status).into(),
            ))
        })?;
        Ok(Seat {
            id: self.id,
            flight_id: self.flight_id,
            row_num: self.row_num,
            col: self.col,
            status,
            order_id: self.order_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_FLIGHT: &str = "\
    SELECT id, flight_number, origin, destination, departure_time, arrival_time, \
           total_seats, available_seats, price_cents, created_at, updated_at \
    FROM flights";

impl FlightRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Flight, StoreError> {
        let row: Option<FlightRow> = sqlx::query_as(&format!("{SELECT_FLIGHT} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Flight::from)
            .ok_or_else(|| DomainError::FlightNotFound(id.to_string()).into())
    }

    pub async fn list_all(&self) -> Result<Vec<Flight>, StoreError> {
        let rows: Vec<FlightRow> =
            sqlx::query_as(&format!("{SELECT_FLIGHT} ORDER BY departure_time ASC"))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Flight::from).collect())
    }

    pub async fn all_flight_ids(&self) -> Result<Vec<String>, StoreError> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM flights ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    pub async fn find_seats(&self, flight_id: &str) -> Result<Vec<Seat>, StoreError> {
        let rows: Vec<SeatRow> = sqlx::query_as(
            "SELECT id, flight_id, row_num, col, status, order_id, created_at, updated_at \
             FROM seats WHERE flight_id = $1 ORDER BY row_num, col",
        )
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SeatRow::into_seat).collect()
    }

    /// Conditionally move seats `available -> reserved` for `order_id`. If any
    /// seat was not available the partial set is rolled back inside this call
    /// and the whole operation reports the first unavailable seat.
    ///
    /// Seats already reserved by the same order count as success, which makes
    /// activity re-execution a no-op.
    pub async fn mark_seats_reserved(
        &self,
        flight_id: &str,
        seat_ids: &[String],
        order_id: &str,
    ) -> Result<(), StoreError> {
        if seat_ids.is_empty() {
            return Ok(());
        }
        let updated: Vec<String> = sqlx::query_scalar(
            "UPDATE seats SET status = 'reserved', order_id = $1, updated_at = NOW() \
             WHERE flight_id = $2 AND id = ANY($3) \
               AND (status = 'available' OR (status = 'reserved' AND order_id = $1)) \
             RETURNING id",
        )
        .bind(order_id)
        .bind(flight_id)
        .bind(seat_ids)
        .fetch_all(&self.pool)
        .await?;

        if updated.len() == seat_ids.len() {
            return Ok(());
        }

        // Roll the partial set back before reporting the conflict.
        if !updated.is_empty() {
            sqlx::query(
                "UPDATE seats SET status = 'available', order_id = NULL, updated_at = NOW() \
                 WHERE flight_id = $1 AND id = ANY($2) AND order_id = $3",
            )
            .bind(flight_id)
            .bind(&updated)
            .bind(order_id)
            .execute(&self.pool)
            .await?;
        }

        let missing = seat_ids
            .iter()
            .find(|s| !updated.contains(s))
            .cloned()
            .unwrap_or_default();
        Err(DomainError::SeatUnavailable { seat: missing }.into())
    }

    /// Unconditionally return seats to `available`, clearing the order
    /// back-reference. Safe to repeat.
    pub async fn mark_seats_available(
        &self,
        flight_id: &str,
        seat_ids: &[String],
    ) -> Result<(), StoreError> {
        if seat_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "UPDATE seats SET status = 'available', order_id = NULL, updated_at = NOW() \
             WHERE flight_id = $1 AND id = ANY($2) AND status <> 'booked'",
        )
        .bind(flight_id)
        .bind(seat_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Move the order's reserved seats to `booked` and decrement the flight's
    /// advisory availability counter, atomically. Re-execution after a
    /// successful commit is detected and skipped so the counter never drops
    /// twice.
    pub async fn book_seats(
        &self,
        flight_id: &str,
        seat_ids: &[String],
        order_id: &str,
    ) -> Result<(), StoreError> {
        if seat_ids.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;

        let booked: Vec<String> = sqlx::query_scalar(
            "UPDATE seats SET status = 'booked', updated_at = NOW() \
             WHERE flight_id = $1 AND id = ANY($2) AND order_id = $3 AND status = 'reserved' \
             RETURNING id",
        )
        .bind(flight_id)
        .bind(seat_ids)
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;

        if booked.is_empty() {
            // Nothing was reserved: either a re-execution after commit, or a
            // genuine conflict. Distinguish by looking at the rows.
            let already: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM seats \
                 WHERE flight_id = $1 AND id = ANY($2) AND order_id = $3 AND status = 'booked'",
            )
            .bind(flight_id)
            .bind(seat_ids)
            .bind(order_id)
            .fetch_one(&mut *tx)
            .await?;
            tx.rollback().await?;
            if already == seat_ids.len() as i64 {
                return Ok(());
            }
            return Err(DomainError::SeatUnavailable {
                seat: seat_ids[0].clone(),
            }
            .into());
        }

        if booked.len() != seat_ids.len() {
            tx.rollback().await?;
            let missing = seat_ids
                .iter()
                .find(|s| !booked.contains(s))
                .cloned()
                .unwrap_or_default();
            return Err(DomainError::SeatUnavailable { seat: missing }.into());
        }

        let result = sqlx::query(
            "UPDATE flights SET available_seats = available_seats - $1, updated_at = NOW() \
             WHERE id = $2 AND available_seats >= $1",
        )
        .bind(seat_ids.len() as i32)
        .bind(flight_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DomainError::InsufficientSeats {
                flight: flight_id.to_string(),
            }
            .into());
        }

        tx.commit().await?;
        Ok(())
    }
}
