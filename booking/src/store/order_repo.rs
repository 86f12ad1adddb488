//! Order rows: creation, guarded status transitions, terminal writes.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{DomainError, Order, OrderStatus};

use super::StoreError;

pub struct OrderRepo {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: String,
    flight_id: String,
    workflow_id: String,
    status: String,
    seats: Vec<String>,
    total_price_cents: i64,
    expires_at: Option<DateTime<Utc>>,
    confirmed_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    payment_attempts: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, StoreError> {
        let status = OrderStatus::parse(&self.status).ok_or_else(|| {
            StoreError::Database(sqlx::Error::Decode(
                format!("unknown order status {:?}", self.status).into(),
            ))
        })?;
        Ok(Order {
            id: self.id,
            flight_id: self.flight_id,
            workflow_id: self.workflow_id,
            status,
            seats: self.seats,
            total_price_cents: self.total_price_cents,
            expires_at: self.expires_at,
            confirmed_at: self.confirmed_at,
            failure_reason: self.failure_reason,
            payment_attempts: self.payment_attempts,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_ORDER: &str = "\
    SELECT id, flight_id, workflow_id, status, seats, total_price_cents, \
           expires_at, confirmed_at, failure_reason, payment_attempts, \
           created_at, updated_at \
    FROM orders";

impl OrderRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new order in `SEATS_RESERVED`. Re-execution of the owning
    /// activity is a no-op thanks to `ON CONFLICT DO NOTHING`.
    pub async fn create(&self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO orders \
                 (id, flight_id, workflow_id, status, seats, total_price_cents, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&order.id)
        .bind(&order.flight_id)
        .bind(&order.workflow_id)
        .bind(order.status.as_str())
        .bind(&order.seats)
        .bind(order.total_price_cents)
        .bind(order.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Order, StoreError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!("{SELECT_ORDER} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| DomainError::OrderNotFound(id.to_string()).into())
            .and_then(OrderRow::into_order)
    }

    /// Move the order to `status`, honouring the domain transition table.
    /// The update predicate is row-scoped on the previously read status so a
    /// concurrent writer cannot sneak an illegal hop in between.
    pub async fn update_status(&self, id: &str, status: OrderStatus) -> Result<(), StoreError> {
        let current = self.find_by_id(id).await?;
        if current.status == status {
            return Ok(());
        }
        if !current.status.can_transition_to(status) {
            return Err(DomainError::IllegalTransition {
                order: id.to_string(),
                from: current.status,
                to: status,
            }
            .into());
        }

        let result = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(status.as_str())
        .bind(id)
        .bind(current.status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::IllegalTransition {
                order: id.to_string(),
                from: current.status,
                to: status,
            }
            .into());
        }
        Ok(())
    }

    /// Replace the seat list and deadline in one statement.
    pub async fn update_seats(
        &self,
        id: &str,
        seats: &[String],
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET seats = $1, expires_at = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(seats)
        .bind(expires_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::OrderNotFound(id.to_string()).into());
        }
        Ok(())
    }

    /// Record payment progress so the status projection can report
    /// "attempt N of M" while the workflow is still running.
    pub async fn update_payment_progress(
        &self,
        id: &str,
        attempts: i32,
        last_error: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET payment_attempts = $1, failure_reason = $2, updated_at = NOW() \
             WHERE id = $3",
        )
        .bind(attempts)
        .bind(last_error)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::OrderNotFound(id.to_string()).into());
        }
        Ok(())
    }

    pub async fn confirm(&self, id: &str) -> Result<(), StoreError> {
        self.terminal_write(
            id,
            OrderStatus::Confirmed,
            "UPDATE orders \
             SET status = 'CONFIRMED', confirmed_at = NOW(), failure_reason = NULL, \
                 updated_at = NOW() \
             WHERE id = $1 AND status NOT IN ('CONFIRMED', 'FAILED', 'EXPIRED')",
            None,
        )
        .await
    }

    pub async fn fail(&self, id: &str, reason: &str) -> Result<(), StoreError> {
        self.terminal_write(
            id,
            OrderStatus::Failed,
            "UPDATE orders SET status = 'FAILED', failure_reason = $2, updated_at = NOW() \
             WHERE id = $1 AND status NOT IN ('CONFIRMED', 'FAILED', 'EXPIRED')",
            Some(reason),
        )
        .await
    }

    pub async fn expire(&self, id: &str) -> Result<(), StoreError> {
        self.terminal_write(
            id,
            OrderStatus::Expired,
            "UPDATE orders SET status = 'EXPIRED', updated_at = NOW() \
             WHERE id = $1 AND status NOT IN ('CONFIRMED', 'FAILED', 'EXPIRED')",
            None,
        )
        .await
    }

    /// Terminal writes refuse to overwrite another terminal state, but treat
    /// "already in the requested state" as success so activity re-execution
    /// stays idempotent.
    async fn terminal_write(
        &self,
        id: &str,
        target: OrderStatus,
        sql: &str,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut query = sqlx::query(sql).bind(id);
        if let Some(reason) = reason {
            query = query.bind(reason);
        }
        let result = query.execute(&self.pool).await?;
        if result.rows_affected() > 0 {
            return Ok(());
        }

        let current = self.find_by_id(id).await?;
        if current.status == target {
            return Ok(());
        }
        Err(DomainError::IllegalTransition {
            order: id.to_string(),
            from: current.status,
            to: target,
        }
        .into())
    }
}
