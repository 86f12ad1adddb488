//! Reconciliation activities: repair drift between the lock store and the
//! authoritative seat rows after worker crashes.

use std::collections::HashMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use temporal_sdk::{ActContext, ActivityError};

use crate::domain::{Seat, SeatStatus};

use super::{shared, store_error};

pub async fn all_flight_ids(
    _ctx: ActContext,
    _payload: Option<String>,
) -> Result<Vec<String>, ActivityError> {
    let a = shared();
    a.flights.all_flight_ids().await.map_err(store_error)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSeatLocksInput {
    pub flight_id: String,
}

/// Release every lock entry that disagrees with the seat rows. Returns how
/// many entries were released. Best-effort: individual release failures are
/// logged and skipped so one bad key never blocks the sweep.
pub async fn reconcile_seat_locks(
    _ctx: ActContext,
    input: ReconcileSeatLocksInput,
) -> Result<u64, ActivityError> {
    let a = shared();

    let locks = a
        .seat_locks
        .locked_seats(&input.flight_id)
        .await
        .map_err(store_error)?;
    if locks.is_empty() {
        return Ok(0);
    }

    let seats = a
        .flights
        .find_seats(&input.flight_id)
        .await
        .map_err(store_error)?;

    let orphans = orphaned_locks(&locks, &seats);
    let mut released = 0u64;
    for (seat_id, owner) in &orphans {
        match a
            .seat_locks
            .release_locks(&input.flight_id, std::slice::from_ref(seat_id), owner)
            .await
        {
            Ok(()) => released += 1,
            Err(err) => {
                warn!(
                    "failed to release orphaned lock on {}:{seat_id}: {err}",
                    input.flight_id
                );
            }
        }
    }

    if released > 0 {
        info!(
            "reconciliation released {released} orphaned lock(s) on flight {}",
            input.flight_id
        );
    }
    Ok(released)
}

/// A lock entry is orphaned when its seat row is missing, available, or held
/// for a different order. The reconciler never creates locks, only deletes.
fn orphaned_locks(
    locks: &HashMap<String, String>,
    seats: &[Seat],
) -> Vec<(String, String)> {
    let held: HashMap<&str, &str> = seats
        .iter()
        .filter(|s| s.status != SeatStatus::Available)
        .filter_map(|s| s.order_id.as_deref().map(|o| (s.id.as_str(), o)))
        .collect();

    locks
        .iter()
        .filter(|(seat_id, owner)| held.get(seat_id.as_str()) != Some(&owner.as_str()))
        .map(|(seat_id, owner)| (seat_id.clone(), owner.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn seat(id: &str, status: SeatStatus, order_id: Option<&str>) -> Seat {
        let now = Utc::now();
        Seat {
            id: id.to_string(),
            flight_id: "f1".to_string(),
            row_num: 1,
            col: "A".to_string(),
            status,
            order_id: order_id.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn agreeing_locks_are_kept() {
        let locks = HashMap::from([("1A".to_string(), "o1".to_string())]);
        let seats = vec![seat("1A", SeatStatus::Reserved, Some("o1"))];
        assert!(orphaned_locks(&locks, &seats).is_empty());
    }

    #[test]
    fn lock_on_available_row_is_orphaned() {
        let locks = HashMap::from([("1A".to_string(), "o1".to_string())]);
        let seats = vec![seat("1A", SeatStatus::Available, None)];
        assert_eq!(
            orphaned_locks(&locks, &seats),
            vec![("1A".to_string(), "o1".to_string())]
        );
    }

    #[test]
    fn lock_with_disagreeing_owner_is_orphaned() {
        let locks = HashMap::from([("1A".to_string(), "o1".to_string())]);
        let seats = vec![seat("1A", SeatStatus::Reserved, Some("o2"))];
        assert_eq!(orphaned_locks(&locks, &seats).len(), 1);
    }

    #[test]
    fn lock_without_a_seat_row_is_orphaned() {
        let locks = HashMap::from([("9Z".to_string(), "o1".to_string())]);
        assert_eq!(orphaned_locks(&locks, &[]).len(), 1);
    }

    #[test]
    fn booked_rows_keep_their_lock_until_owner_mismatch() {
        // A lock lingering after confirmation is legitimate for its owner
        // (release failed mid-confirm) and foreign for anyone else.
        let seats = vec![seat("1A", SeatStatus::Booked, Some("o1"))];
        let own = HashMap::from([("1A".to_string(), "o1".to_string())]);
        assert!(orphaned_locks(&own, &seats).is_empty());
        let foreign = HashMap::from([("1A".to_string(), "o2".to_string())]);
        assert_eq!(orphaned_locks(&foreign, &seats).len(), 1);
    }
}
