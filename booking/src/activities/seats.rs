//! Seat inventory activities: lock entries first, authoritative rows second.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use temporal_sdk::{ActContext, ActivityError};

use super::{shared, store_error};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveSeatsInput {
    pub order_id: String,
    pub flight_id: String,
    pub seats: Vec<String>,
    pub hold_seconds: u64,
}

/// Acquire Redis lock entries with TTL = hold + buffer, then mark the seat
/// rows reserved. The row update is the authoritative admission check; on row
/// failure the just-acquired locks are released again so no partial hold
/// survives this activity.
pub async fn reserve_seats(
    _ctx: ActContext,
    input: ReserveSeatsInput,
) -> Result<(), ActivityError> {
    let a = shared();
    let ttl = a.lock_ttl(input.hold_seconds);

    a.seat_locks
        .lock_seats(&input.flight_id, &input.seats, &input.order_id, ttl)
        .await
        .map_err(store_error)?;

    if let Err(err) = a
        .flights
        .mark_seats_reserved(&input.flight_id, &input.seats, &input.order_id)
        .await
    {
        if let Err(release_err) = a
            .seat_locks
            .release_locks(&input.flight_id, &input.seats, &input.order_id)
            .await
        {
            warn!(
                "failed to release locks after reserve failure for order {}: {release_err}",
                input.order_id
            );
        }
        return Err(store_error(err));
    }

    info!(
        "reserved seats {:?} on flight {} for order {}",
        input.seats, input.flight_id, input.order_id
    );
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSeatsInput {
    pub order_id: String,
    pub flight_id: String,
    pub seats: Vec<String>,
}

/// Compare-and-delete the lock entries, then return the rows to `available`.
/// Safe to call repeatedly and with partially released seat sets.
pub async fn release_seats(
    _ctx: ActContext,
    input: ReleaseSeatsInput,
) -> Result<(), ActivityError> {
    let a = shared();

    a.seat_locks
        .release_locks(&input.flight_id, &input.seats, &input.order_id)
        .await
        .map_err(store_error)?;

    a.flights
        .mark_seats_available(&input.flight_id, &input.seats)
        .await
        .map_err(store_error)?;

    info!(
        "released seats {:?} on flight {} for order {}",
        input.seats, input.flight_id, input.order_id
    );
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSeatSelectionInput {
    pub order_id: String,
    pub flight_id: String,
    pub old_seats: Vec<String>,
    pub new_seats: Vec<String>,
    pub hold_seconds: u64,
}

/// Swap the order's held seats. Seats present in both selections are kept and
/// only get a TTL refresh (the hold deadline resets); dropped seats are
/// released; added seats are acquired. If any stage of the acquisition fails,
/// the dropped set is re-acquired best-effort and the activity fails, so the
/// workflow keeps the old selection as its state.
pub async fn update_seat_selection(
    _ctx: ActContext,
    input: UpdateSeatSelectionInput,
) -> Result<(), ActivityError> {
    let a = shared();
    let ttl = a.lock_ttl(input.hold_seconds);

    let dropped: Vec<String> = input
        .old_seats
        .iter()
        .filter(|s| !input.new_seats.contains(s))
        .cloned()
        .collect();
    let kept: Vec<String> = input
        .old_seats
        .iter()
        .filter(|s| input.new_seats.contains(s))
        .cloned()
        .collect();
    let added: Vec<String> = input
        .new_seats
        .iter()
        .filter(|s| !input.old_seats.contains(s))
        .cloned()
        .collect();

    if !dropped.is_empty() {
        a.seat_locks
            .release_locks(&input.flight_id, &dropped, &input.order_id)
            .await
            .map_err(store_error)?;
        a.flights
            .mark_seats_available(&input.flight_id, &dropped)
            .await
            .map_err(store_error)?;
    }

    // Kept seats stay reserved in the rows; their lock entries must outlive
    // the freshly reset hold deadline.
    if !kept.is_empty() {
        a.seat_locks
            .extend_locks(&input.flight_id, &kept, &input.order_id, ttl)
            .await
            .map_err(store_error)?;
    }

    if input.new_seats.is_empty() {
        info!(
            "order {} released all seats via empty selection",
            input.order_id
        );
        return Ok(());
    }

    if added.is_empty() {
        return Ok(());
    }

    if let Err(err) = a
        .seat_locks
        .lock_seats(&input.flight_id, &added, &input.order_id, ttl)
        .await
    {
        reacquire_seats(&a, &input, &dropped, ttl).await;
        return Err(store_error(err));
    }

    if let Err(err) = a
        .flights
        .mark_seats_reserved(&input.flight_id, &added, &input.order_id)
        .await
    {
        if let Err(release_err) = a
            .seat_locks
            .release_locks(&input.flight_id, &added, &input.order_id)
            .await
        {
            warn!(
                "failed to release new-seat locks for order {}: {release_err}",
                input.order_id
            );
        }
        reacquire_seats(&a, &input, &dropped, ttl).await;
        return Err(store_error(err));
    }

    info!(
        "order {} moved from seats {:?} to {:?}",
        input.order_id, input.old_seats, input.new_seats
    );
    Ok(())
}

/// Best-effort rollback of the dropped seats. Failures are logged, not
/// propagated: the caller is already reporting the original error, and the
/// reconciler repairs whatever is left behind.
async fn reacquire_seats(
    a: &super::BookingActivities,
    input: &UpdateSeatSelectionInput,
    seats: &[String],
    ttl: std::time::Duration,
) {
    if seats.is_empty() {
        return;
    }
    if let Err(err) = a
        .seat_locks
        .lock_seats(&input.flight_id, seats, &input.order_id, ttl)
        .await
    {
        warn!(
            "failed to re-lock old seats for order {}: {err}",
            input.order_id
        );
        return;
    }
    if let Err(err) = a
        .flights
        .mark_seats_reserved(&input.flight_id, seats, &input.order_id)
        .await
    {
        warn!(
            "failed to re-reserve old seats for order {}: {err}",
            input.order_id
        );
    }
}
