//! Activities executed by the booking and reconciliation workflows.
//!
//! Every activity is a free async fn over a [`BookingActivities`] singleton
//! that owns the repositories; the worker binary initialises the singleton
//! before registering anything. Activities are idempotent at the level of
//! their intended post-state because the engine may re-execute any of them.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use sqlx::PgPool;
use temporal_sdk::ActivityError;

use crate::config::BookingConfig;
use crate::store::{FlightRepo, OrderRepo, SeatLockRepo, StoreError};

mod orders;
mod payment;
mod reconcile;
mod seats;

pub use orders::*;
pub use payment::*;
pub use reconcile::*;
pub use seats::*;

// Activity type names, shared by worker registration and workflow callers.
pub const RESERVE_SEATS: &str = "reserve_seats";
pub const RELEASE_SEATS: &str = "release_seats";
pub const UPDATE_SEAT_SELECTION: &str = "update_seat_selection";
pub const CREATE_ORDER: &str = "create_order";
pub const UPDATE_ORDER_SEATS: &str = "update_order_seats";
pub const UPDATE_ORDER_STATUS: &str = "update_order_status";
pub const RECORD_PAYMENT_ATTEMPT: &str = "record_payment_attempt";
pub const CONFIRM_ORDER: &str = "confirm_order";
pub const FAIL_ORDER: &str = "fail_order";
pub const EXPIRE_ORDER: &str = "expire_order";
pub const VALIDATE_PAYMENT: &str = "validate_payment";
pub const ALL_FLIGHT_IDS: &str = "all_flight_ids";
pub const RECONCILE_SEAT_LOCKS: &str = "reconcile_seat_locks";

/// Shared state for all activities in a worker process.
pub struct BookingActivities {
    pub orders: OrderRepo,
    pub flights: FlightRepo,
    pub seat_locks: SeatLockRepo,
    pub cfg: BookingConfig,
}

impl BookingActivities {
    pub fn new(pool: PgPool, redis: redis::Client, cfg: BookingConfig) -> Self {
        Self {
            orders: OrderRepo::new(pool.clone()),
            flights: FlightRepo::new(pool),
            seat_locks: SeatLockRepo::new(redis),
            cfg,
        }
    }

    /// Lock entries must outlive the workflow timer so expiry is always
    /// driven by the workflow, with the TTL as the crash safety net.
    pub fn lock_ttl(&self, hold_seconds: u64) -> std::time::Duration {
        std::time::Duration::from_secs(hold_seconds) + self.cfg.lock_ttl_buffer
    }
}

/// Worker-global singleton, set once at startup before registration.
pub static ACTIVITIES: OnceCell<Arc<BookingActivities>> = OnceCell::new();

pub(crate) fn shared() -> Arc<BookingActivities> {
    ACTIVITIES
        .get()
        .expect("BookingActivities not initialized")
        .clone()
}

/// Map a store error onto the activity error taxonomy: domain violations are
/// non-retryable, infrastructure trouble keeps the default retryable class.
pub(crate) fn store_error(err: StoreError) -> ActivityError {
    if err.is_terminal() {
        ActivityError::NonRetryable(err.into())
    } else {
        ActivityError::from(anyhow::Error::from(err))
    }
}
