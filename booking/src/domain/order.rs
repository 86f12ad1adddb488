use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a booking order. The string forms are part of the external
/// contract (persisted rows and API responses use them verbatim).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "CREATED")]
    Created,
    #[serde(rename = "SEATS_RESERVED")]
    SeatsReserved,
    #[serde(rename = "PAYMENT_PENDING")]
    PaymentPending,
    #[serde(rename = "PAYMENT_PROCESSING")]
    PaymentProcessing,
    #[serde(rename = "CONFIRMED")]
    Confirmed,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "EXPIRED")]
    Expired,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::SeatsReserved => "SEATS_RESERVED",
            OrderStatus::PaymentPending => "PAYMENT_PENDING",
            OrderStatus::PaymentProcessing => "PAYMENT_PROCESSING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(OrderStatus::Created),
            "SEATS_RESERVED" => Some(OrderStatus::SeatsReserved),
            "PAYMENT_PENDING" => Some(OrderStatus::PaymentPending),
            "PAYMENT_PROCESSING" => Some(OrderStatus::PaymentProcessing),
            "CONFIRMED" => Some(OrderStatus::Confirmed),
            "FAILED" => Some(OrderStatus::Failed),
            "EXPIRED" => Some(OrderStatus::Expired),
            _ => None,
        }
    }

    /// Terminal states absorb: once reached, no further transition is legal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Confirmed | OrderStatus::Failed | OrderStatus::Expired
        )
    }

    /// The transition table of the booking state machine. Anything not listed
    /// here is rejected by the order store.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match self {
            Created => matches!(next, SeatsReserved | Failed),
            SeatsReserved => matches!(next, PaymentPending | PaymentProcessing | Expired | Failed),
            PaymentPending => matches!(next, PaymentProcessing | Expired | Failed),
            PaymentProcessing => matches!(next, Confirmed | Failed),
            Confirmed | Failed | Expired => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A booking order as persisted in the relational store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub flight_id: String,
    pub workflow_id: String,
    pub status: OrderStatus,
    pub seats: Vec<String>,
    pub total_price_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub payment_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;

    #[test]
    fn happy_path_transitions_are_legal() {
        assert!(Created.can_transition_to(SeatsReserved));
        assert!(SeatsReserved.can_transition_to(PaymentProcessing));
        assert!(PaymentProcessing.can_transition_to(Confirmed));
    }

    #[test]
    fn every_active_state_can_fail() {
        for from in [Created, SeatsReserved, PaymentPending, PaymentProcessing] {
            assert!(from.can_transition_to(Failed), "{from} should allow FAILED");
        }
    }

    #[test]
    fn only_the_hold_states_can_expire() {
        assert!(SeatsReserved.can_transition_to(Expired));
        assert!(PaymentPending.can_transition_to(Expired));
        assert!(!Created.can_transition_to(Expired));
        assert!(!PaymentProcessing.can_transition_to(Expired));
    }

    #[test]
    fn terminal_states_absorb() {
        for terminal in [Confirmed, Failed, Expired] {
            assert!(terminal.is_terminal());
            for next in [
                Created,
                SeatsReserved,
                PaymentPending,
                PaymentProcessing,
                Confirmed,
                Failed,
                Expired,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn status_strings_round_trip_the_wire_contract() {
        for (status, s) in [
            (Created, "CREATED"),
            (SeatsReserved, "SEATS_RESERVED"),
            (PaymentPending, "PAYMENT_PENDING"),
            (PaymentProcessing, "PAYMENT_PROCESSING"),
            (Confirmed, "CONFIRMED"),
            (Failed, "FAILED"),
            (Expired, "EXPIRED"),
        ] {
            assert_eq!(status.as_str(), s);
            assert_eq!(super::OrderStatus::parse(s), Some(status));
        }
        assert_eq!(super::OrderStatus::parse("BOGUS"), None);
    }
}
