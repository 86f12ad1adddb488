use super::OrderStatus;

/// Business-rule violations. These are terminal from the point of view of a
/// single workflow run: retrying the same operation cannot make them pass.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("flight {0} not found")]
    FlightNotFound(String),

    #[error("order {0} not found")]
    OrderNotFound(String),

    #[error("seat {seat} is not available")]
    SeatUnavailable { seat: String },

    #[error("seat {seat} is already locked by order {owner}")]
    SeatAlreadyLocked { seat: String, owner: String },

    #[error("insufficient seats available on flight {flight}")]
    InsufficientSeats { flight: String },

    #[error("order {order} cannot transition from {from} to {to}")]
    IllegalTransition {
        order: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("seat selection must not be empty")]
    EmptySeatSelection,

    #[error("payment code must be exactly 5 digits")]
    InvalidPaymentCode,
}
