//! Order-row activities: thin wrappers over the order store, plus the
//! confirmation step that books seats and settles the flight counter.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use temporal_sdk::{ActContext, ActivityError};

use crate::domain::{Order, OrderStatus};

use super::{shared, store_error};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderInput {
    pub order_id: String,
    pub flight_id: String,
    pub workflow_id: String,
    pub seats: Vec<String>,
    pub hold_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderOutput {
    pub expires_at: DateTime<Utc>,
}

/// Insert the order row in `SEATS_RESERVED`, pricing it off the flight's unit
/// price. The expiry deadline is computed here (wall time lives in
/// activities, never in the workflow) and handed back so the workflow state
/// matches the row exactly.
pub async fn create_order(
    _ctx: ActContext,
    input: CreateOrderInput,
) -> Result<CreateOrderOutput, ActivityError> {
    let a = shared();

    let flight = a
        .flights
        .find_by_id(&input.flight_id)
        .await
        .map_err(store_error)?;
    let total_price_cents = flight.price_cents * input.seats.len() as i64;
    let expires_at = Utc::now() + ChronoDuration::seconds(input.hold_seconds as i64);

    let now = Utc::now();
    let order = Order {
        id: input.order_id.clone(),
        flight_id: input.flight_id.clone(),
        workflow_id: input.workflow_id.clone(),
        status: OrderStatus::SeatsReserved,
        seats: input.seats.clone(),
        total_price_cents,
        expires_at: Some(expires_at),
        confirmed_at: None,
        failure_reason: None,
        payment_attempts: 0,
        created_at: now,
        updated_at: now,
    };
    a.orders.create(&order).await.map_err(store_error)?;

    // A re-executed create hits ON CONFLICT DO NOTHING; report the deadline
    // that actually stuck.
    let row = a
        .orders
        .find_by_id(&input.order_id)
        .await
        .map_err(store_error)?;

    info!("created order {} on flight {}", input.order_id, input.flight_id);
    Ok(CreateOrderOutput {
        expires_at: row.expires_at.unwrap_or(expires_at),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderSeatsInput {
    pub order_id: String,
    pub seats: Vec<String>,
    pub hold_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderSeatsOutput {
    pub expires_at: DateTime<Utc>,
}

/// Replace the persisted seat list and push the deadline out by a full hold.
pub async fn update_order_seats(
    _ctx: ActContext,
    input: UpdateOrderSeatsInput,
) -> Result<UpdateOrderSeatsOutput, ActivityError> {
    let a = shared();
    let expires_at = Utc::now() + ChronoDuration::seconds(input.hold_seconds as i64);
    a.orders
        .update_seats(&input.order_id, &input.seats, expires_at)
        .await
        .map_err(store_error)?;
    Ok(UpdateOrderSeatsOutput { expires_at })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusInput {
    pub order_id: String,
    pub status: OrderStatus,
}

pub async fn update_order_status(
    _ctx: ActContext,
    input: UpdateOrderStatusInput,
) -> Result<(), ActivityError> {
    let a = shared();
    a.orders
        .update_status(&input.order_id, input.status)
        .await
        .map_err(store_error)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentAttemptInput {
    pub order_id: String,
    pub attempt: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Persist payment progress so the status projection can show
/// "attempt N of M" while the retry loop runs.
pub async fn record_payment_attempt(
    _ctx: ActContext,
    input: RecordPaymentAttemptInput,
) -> Result<(), ActivityError> {
    let a = shared();
    a.orders
        .update_payment_progress(&input.order_id, input.attempt, input.last_error.as_deref())
        .await
        .map_err(store_error)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOrderInput {
    pub order_id: String,
    pub flight_id: String,
    pub seats: Vec<String>,
}

/// Confirm the order, book its seat rows (and settle the availability
/// counter in the same transaction), then drop the now-redundant lock
/// entries. A lingering lock after a release failure is repaired by the
/// reconciler within one sweep.
pub async fn confirm_order(
    _ctx: ActContext,
    input: ConfirmOrderInput,
) -> Result<(), ActivityError> {
    let a = shared();

    a.orders.confirm(&input.order_id).await.map_err(store_error)?;

    a.flights
        .book_seats(&input.flight_id, &input.seats, &input.order_id)
        .await
        .map_err(store_error)?;

    if let Err(err) = a
        .seat_locks
        .release_locks(&input.flight_id, &input.seats, &input.order_id)
        .await
    {
        warn!(
            "failed to release locks after confirming order {}: {err}",
            input.order_id
        );
    }

    info!("confirmed order {} with seats {:?}", input.order_id, input.seats);
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailOrderInput {
    pub order_id: String,
    pub reason: String,
}

pub async fn fail_order(_ctx: ActContext, input: FailOrderInput) -> Result<(), ActivityError> {
    let a = shared();
    a.orders
        .fail(&input.order_id, &input.reason)
        .await
        .map_err(store_error)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpireOrderInput {
    pub order_id: String,
}

pub async fn expire_order(_ctx: ActContext, input: ExpireOrderInput) -> Result<(), ActivityError> {
    let a = shared();
    a.orders.expire(&input.order_id).await.map_err(store_error)
}
