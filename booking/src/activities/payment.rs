//! Simulated payment gateway.
//!
//! The verdict is a serialisable tagged value rather than an error string:
//! the workflow's retry loop branches on the tag, never on message text.

use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};
use temporal_sdk::{ActContext, ActivityError};

use super::shared;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePaymentInput {
    pub order_id: String,
    pub payment_code: String,
}

/// Terminal decline classifications. The names are wire-stable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentDeclineKind {
    #[serde(rename = "INVALID_PAYMENT_CODE")]
    InvalidPaymentCode,
    #[serde(rename = "PAYMENT_DECLINED")]
    PaymentDeclined,
}

/// Outcome of one validation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum PaymentVerdict {
    /// Payment accepted.
    Approved { message: String },
    /// Transient gateway failure; the workflow may try again.
    Retry { message: String },
    /// Terminal decline; further attempts are pointless.
    Declined {
        kind: PaymentDeclineKind,
        message: String,
    },
}

/// Validate a payment code.
///
/// Codes must be exactly five decimal digits. `00000` always declines and
/// `99999` always succeeds instantly (test determinism); any other
/// well-formed code takes a uniformly random 1-8 s and fails transiently with
/// the configured probability. The workflow caps a single attempt at 10 s.
pub async fn validate_payment(
    _ctx: ActContext,
    input: ValidatePaymentInput,
) -> Result<PaymentVerdict, ActivityError> {
    if let Some(verdict) = classify_code(&input.payment_code) {
        info!(
            "payment for order {} classified without gateway call: {verdict:?}",
            input.order_id
        );
        return Ok(verdict);
    }

    let a = shared();
    let (delay_secs, roll) = {
        let mut rng = rand::thread_rng();
        (rng.gen_range(1..=8u64), rng.gen::<f64>())
    };
    tokio::time::sleep(std::time::Duration::from_secs(delay_secs)).await;

    let verdict = gateway_verdict(a.cfg.payment_failure_rate, roll);
    info!(
        "payment for order {} took {delay_secs}s: {verdict:?}",
        input.order_id
    );
    Ok(verdict)
}

/// Format check plus the two special test codes. Returns `None` when the
/// simulated gateway roll has to decide.
pub fn classify_code(code: &str) -> Option<PaymentVerdict> {
    if !is_valid_payment_code(code) {
        return Some(PaymentVerdict::Declined {
            kind: PaymentDeclineKind::InvalidPaymentCode,
            message: "payment code must be 5 digits".to_string(),
        });
    }
    match code {
        "00000" => Some(PaymentVerdict::Declined {
            kind: PaymentDeclineKind::PaymentDeclined,
            message: "payment declined: insufficient funds".to_string(),
        }),
        "99999" => Some(PaymentVerdict::Approved {
            message: "payment validated (test mode)".to_string(),
        }),
        _ => None,
    }
}

pub fn is_valid_payment_code(code: &str) -> bool {
    code.len() == 5 && code.bytes().all(|b| b.is_ascii_digit())
}

fn gateway_verdict(failure_rate: f64, roll: f64) -> PaymentVerdict {
    if roll < failure_rate {
        PaymentVerdict::Retry {
            message: "payment validation failed: temporary gateway error".to_string(),
        }
    } else {
        PaymentVerdict::Approved {
            message: "payment validated successfully".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_must_be_exactly_five_digits() {
        assert!(is_valid_payment_code("12345"));
        assert!(!is_valid_payment_code("1234"));
        assert!(!is_valid_payment_code("123456"));
        assert!(!is_valid_payment_code("12a45"));
        assert!(!is_valid_payment_code(""));
    }

    #[test]
    fn malformed_codes_decline_as_invalid() {
        for code in ["1234", "123456", "abcde"] {
            match classify_code(code) {
                Some(PaymentVerdict::Declined { kind, .. }) => {
                    assert_eq!(kind, PaymentDeclineKind::InvalidPaymentCode)
                }
                other => panic!("expected invalid-code decline for {code:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn special_codes_short_circuit() {
        match classify_code("00000") {
            Some(PaymentVerdict::Declined { kind, message }) => {
                assert_eq!(kind, PaymentDeclineKind::PaymentDeclined);
                assert!(message.contains("declined"));
            }
            other => panic!("unexpected verdict {other:?}"),
        }
        assert!(matches!(
            classify_code("99999"),
            Some(PaymentVerdict::Approved { .. })
        ));
        assert!(classify_code("12345").is_none());
    }

    #[test]
    fn failure_rate_bounds_the_gateway_roll() {
        // Rate 1.0 always fails transiently, rate 0.0 always approves.
        for roll in [0.0, 0.5, 0.999] {
            assert!(matches!(
                gateway_verdict(1.0, roll),
                PaymentVerdict::Retry { .. }
            ));
            assert!(matches!(
                gateway_verdict(0.0, roll),
                PaymentVerdict::Approved { .. }
            ));
        }
    }

    #[test]
    fn verdict_tag_is_wire_stable() {
        let verdict = PaymentVerdict::Declined {
            kind: PaymentDeclineKind::PaymentDeclined,
            message: "no".into(),
        };
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["outcome"], "declined");
        assert_eq!(json["kind"], "PAYMENT_DECLINED");
    }
}
