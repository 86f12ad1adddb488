//! Wire-stable names and payload shapes shared by the workflow, the client
//! facade and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::OrderStatus;

pub const SIGNAL_UPDATE_SEATS: &str = "update-seats";
pub const SIGNAL_PROCEED_TO_PAYMENT: &str = "proceed-to-payment";
pub const SIGNAL_CANCEL_BOOKING: &str = "cancel-booking";

/// Query name reserved for booking status. The Rust SDK does not yet expose
/// worker-side query registration, so [`crate::client::BookingClient`] serves
/// this query from the authoritative order row instead; the name stays part
/// of the wire contract for callers that speak it.
pub const QUERY_BOOKING_STATUS: &str = "booking-status";

/// Payload of `update-seats`. An empty list releases all seats while leaving
/// the order in `SEATS_RESERVED`; rejecting empty selections is the calling
/// layer's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatUpdateSignal {
    pub seats: Vec<String>,
}

/// Payload of `proceed-to-payment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSignal {
    pub payment_code: String,
}

/// Input of the booking workflow. `hold_seconds` makes the seat hold
/// configurable per deployment; the facade fills it from config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingWorkflowInput {
    pub order_id: String,
    pub flight_id: String,
    pub seats: Vec<String>,
    pub hold_seconds: u64,
}

/// Result payload of a successfully confirmed booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingWorkflowResult {
    pub order_id: String,
    pub status: OrderStatus,
    pub seats: Vec<String>,
}

/// Observable state of a booking, served by the facade's status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingStatusResponse {
    pub order_id: String,
    pub flight_id: String,
    pub status: OrderStatus,
    pub seats: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Seconds until the hold expires; 0 once expired or terminal.
    pub timer_remaining: i64,
    pub payment_attempts: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_use_camel_case_on_the_wire() {
        let signal = PaymentSignal {
            payment_code: "12345".into(),
        };
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["paymentCode"], "12345");

        let input = BookingWorkflowInput {
            order_id: "o1".into(),
            flight_id: "f1".into(),
            seats: vec!["1A".into()],
            hold_seconds: 900,
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["orderId"], "o1");
        assert_eq!(json["holdSeconds"], 900);
    }

    #[test]
    fn status_response_serialises_the_contract_fields() {
        let response = BookingStatusResponse {
            order_id: "o1".into(),
            flight_id: "f1".into(),
            status: crate::domain::OrderStatus::SeatsReserved,
            seats: vec!["1A".into(), "1B".into()],
            expires_at: None,
            timer_remaining: 0,
            payment_attempts: 2,
            last_error: Some("payment failed (attempt 2 of 3): gateway error".into()),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "SEATS_RESERVED");
        assert_eq!(json["timerRemaining"], 0);
        assert_eq!(json["paymentAttempts"], 2);
        assert!(json.get("expiresAt").is_none());
    }
}
