//! The durable booking state machine.
//!
//! One workflow instance per order: reserve seats, hold them behind a timer
//! while seat-change signals reset the deadline, validate payment with a
//! bounded retry loop, confirm. Every exit that leaves the order anything
//! other than `CONFIRMED` runs a compensation pass that releases the held
//! seats on a non-cancellable activity context.
//!
//! Determinism: only engine timers and activity results drive this function;
//! wall-clock reads, randomness and I/O all live in activities.

use std::time::Duration;

use anyhow::anyhow;
use futures_util::{FutureExt, Stream, StreamExt};
use log::{error, info, warn};
use prost_wkt_types::Duration as ProstDuration;
use temporal_sdk::{ActivityOptions, WfContext, WfExitValue, WorkflowResult};
use temporal_sdk_core::protos::temporal::api::common::v1::RetryPolicy;
use temporal_sdk_core_protos::coresdk::{
    workflow_commands::ActivityCancellationType, AsJsonPayloadExt, FromJsonPayloadExt,
};

use helpers::parse_activity_result;

use crate::activities::{
    ConfirmOrderInput, CreateOrderInput, CreateOrderOutput, ExpireOrderInput, FailOrderInput,
    PaymentVerdict, RecordPaymentAttemptInput, ReleaseSeatsInput, ReserveSeatsInput,
    UpdateOrderSeatsInput, UpdateOrderSeatsOutput, UpdateOrderStatusInput,
    UpdateSeatSelectionInput, ValidatePaymentInput, CONFIRM_ORDER, CREATE_ORDER, EXPIRE_ORDER,
    FAIL_ORDER, RECORD_PAYMENT_ATTEMPT, RELEASE_SEATS, RESERVE_SEATS, UPDATE_ORDER_SEATS,
    UPDATE_ORDER_STATUS, UPDATE_SEAT_SELECTION, VALIDATE_PAYMENT,
};
use crate::domain::OrderStatus;
use crate::signals::{
    BookingWorkflowInput, BookingWorkflowResult, PaymentSignal, SeatUpdateSignal,
    SIGNAL_CANCEL_BOOKING, SIGNAL_PROCEED_TO_PAYMENT, SIGNAL_UPDATE_SEATS,
};

pub const BOOKING_WORKFLOW_TYPE: &str = "booking_workflow";

pub const MAX_PAYMENT_ATTEMPTS: u32 = 3;

const SEAT_ACTIVITY_TIMEOUT: Duration = Duration::from_secs(30);
const ORDER_ACTIVITY_TIMEOUT: Duration = Duration::from_secs(30);
const PAYMENT_ACTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Derive the workflow id for an order (1:1, both directions).
pub fn workflow_id(order_id: &str) -> String {
    format!("booking-{order_id}")
}

/// Backoff before payment retry `attempt` (1-based): 1 s, then 2 s.
fn payment_backoff(attempt: u32) -> Duration {
    Duration::from_secs(attempt as u64)
}

struct BookingState {
    order_id: String,
    flight_id: String,
    seats: Vec<String>,
    status: OrderStatus,
    payment_attempts: u32,
    last_error: Option<String>,
}

enum Outcome {
    Confirmed,
    Expired,
    Canceled { external: bool },
    Failed(String),
}

pub async fn booking_workflow(ctx: WfContext) -> WorkflowResult<BookingWorkflowResult> {
    let input: BookingWorkflowInput = ctx
        .get_args()
        .first()
        .map(BookingWorkflowInput::from_json_payload)
        .transpose()?
        .ok_or_else(|| anyhow!("booking workflow requires an input payload"))?;

    info!(
        "booking workflow started: order={} flight={} seats={:?}",
        input.order_id, input.flight_id, input.seats
    );

    let mut state = BookingState {
        order_id: input.order_id.clone(),
        flight_id: input.flight_id.clone(),
        seats: input.seats.clone(),
        status: OrderStatus::Created,
        payment_attempts: 0,
        last_error: None,
    };

    let mut update_chan = ctx.make_signal_channel(SIGNAL_UPDATE_SEATS);
    let mut pay_chan = ctx.make_signal_channel(SIGNAL_PROCEED_TO_PAYMENT);
    let mut cancel_chan = ctx.make_signal_channel(SIGNAL_CANCEL_BOOKING);

    let hold = Duration::from_secs(input.hold_seconds);

    // The booking drive runs in a block so that compensation and signal
    // draining below happen on every exit path, the way a deferred cleanup
    // would.
    let outcome: Result<Outcome, anyhow::Error> = async {
        let ctx = &ctx;
        let state = &mut state;

        // Reserve phase: order row first (seat rows reference it), then seats.
        let created: CreateOrderOutput = match order_activity(
            ctx,
            CREATE_ORDER,
            &CreateOrderInput {
                order_id: input.order_id.clone(),
                flight_id: input.flight_id.clone(),
                workflow_id: workflow_id(&input.order_id),
                seats: input.seats.clone(),
                hold_seconds: input.hold_seconds,
            },
        )
        .await
        {
            Ok(out) => out,
            Err(err) => {
                // No row exists yet, so there is nothing to mark failed.
                state.status = OrderStatus::Failed;
                let reason = format!("create order: {err}");
                state.last_error = Some(reason.clone());
                return Ok(Outcome::Failed(reason));
            }
        };
        info!(
            "order {} created, hold expires at {}",
            input.order_id, created.expires_at
        );

        state.status = OrderStatus::SeatsReserved;
        if let Err(err) = seat_activity(
            ctx,
            RESERVE_SEATS,
            &ReserveSeatsInput {
                order_id: input.order_id.clone(),
                flight_id: input.flight_id.clone(),
                seats: input.seats.clone(),
                hold_seconds: input.hold_seconds,
            },
        )
        .await
        {
            return fail_with(ctx, state, format!("seats unavailable: {err}")).await;
        }
        info!("order {} reserved seats {:?}", input.order_id, state.seats);

        // Hold phase: wait for payment, seat changes, cancellation or expiry.
        // A successful seat change abandons the current timer and arms a
        // fresh full hold; a failed one leaves the running timer untouched.
        // The select is biased so a signal enqueued before the timer fires
        // always wins, and replay sees the same choice.
        let payment_code = 'hold: loop {
            let hold_timer = ctx.timer(hold);
            tokio::pin!(hold_timer);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel_chan.next() => {
                        info!("order {} canceled by user", state.order_id);
                        state.status = OrderStatus::Failed;
                        let reason = "booking canceled by user".to_string();
                        state.last_error = Some(reason.clone());
                        let _ = order_activity::<_, ()>(ctx, FAIL_ORDER, &FailOrderInput {
                            order_id: state.order_id.clone(),
                            reason,
                        }).await;
                        return Ok(Outcome::Canceled { external: false });
                    }
                    maybe_sig = pay_chan.next() => {
                        let Some(sig) = maybe_sig else { continue };
                        match sig.input.first().map(PaymentSignal::from_json_payload) {
                            Some(Ok(payment)) => {
                                info!("order {} proceeding to payment", state.order_id);
                                break 'hold payment.payment_code;
                            }
                            _ => {
                                warn!("order {} received malformed payment signal", state.order_id);
                                state.last_error =
                                    Some("malformed proceed-to-payment payload".to_string());
                            }
                        }
                    }
                    maybe_sig = update_chan.next() => {
                        let Some(sig) = maybe_sig else { continue };
                        let update: SeatUpdateSignal =
                            match sig.input.first().map(SeatUpdateSignal::from_json_payload) {
                                Some(Ok(update)) => update,
                                _ => {
                                    warn!(
                                        "order {} received malformed seat update signal",
                                        state.order_id
                                    );
                                    state.last_error =
                                        Some("malformed update-seats payload".to_string());
                                    continue;
                                }
                            };
                        info!("order {} changing seats to {:?}", state.order_id, update.seats);
                        match seat_activity(ctx, UPDATE_SEAT_SELECTION, &UpdateSeatSelectionInput {
                            order_id: state.order_id.clone(),
                            flight_id: state.flight_id.clone(),
                            old_seats: state.seats.clone(),
                            new_seats: update.seats.clone(),
                            hold_seconds: input.hold_seconds,
                        }).await {
                            Ok(()) => {
                                state.seats = update.seats;
                                state.last_error = None;
                                match order_activity::<_, UpdateOrderSeatsOutput>(
                                    ctx,
                                    UPDATE_ORDER_SEATS,
                                    &UpdateOrderSeatsInput {
                                        order_id: state.order_id.clone(),
                                        seats: state.seats.clone(),
                                        hold_seconds: input.hold_seconds,
                                    },
                                ).await {
                                    Ok(out) => info!(
                                        "order {} hold extended to {}",
                                        state.order_id, out.expires_at
                                    ),
                                    Err(err) => warn!(
                                        "order {} seat list persisted late: {err}",
                                        state.order_id
                                    ),
                                }
                                // Fresh deadline: drop the old timer, arm a new one.
                                continue 'hold;
                            }
                            Err(err) => {
                                warn!("order {} seat update rejected: {err}", state.order_id);
                                state.last_error = Some(format!("seat update failed: {err}"));
                                // Old seats and old deadline stay in force.
                            }
                        }
                    }
                    _ = &mut hold_timer => {
                        info!("order {} hold expired", state.order_id);
                        state.status = OrderStatus::Expired;
                        state.last_error = Some("seat reservation expired".to_string());
                        let _ = order_activity::<_, ()>(ctx, EXPIRE_ORDER, &ExpireOrderInput {
                            order_id: state.order_id.clone(),
                        }).await;
                        return Ok(Outcome::Expired);
                    }
                    _ = ctx.cancelled() => {
                        warn!("order {} workflow canceled externally", state.order_id);
                        state.status = OrderStatus::Failed;
                        let reason = "booking workflow canceled".to_string();
                        state.last_error = Some(reason.clone());
                        let _ = order_activity::<_, ()>(ctx, FAIL_ORDER, &FailOrderInput {
                            order_id: state.order_id.clone(),
                            reason,
                        }).await;
                        return Ok(Outcome::Canceled { external: true });
                    }
                }
            }
        };

        // Payment phase: engine-level retries are off, the loop below owns
        // the attempt count so it stays observable.
        state.status = OrderStatus::PaymentProcessing;
        let _ = order_activity::<_, ()>(
            ctx,
            UPDATE_ORDER_STATUS,
            &UpdateOrderStatusInput {
                order_id: state.order_id.clone(),
                status: OrderStatus::PaymentProcessing,
            },
        )
        .await;

        let mut approved = false;
        for attempt in 1..=MAX_PAYMENT_ATTEMPTS {
            state.payment_attempts = attempt;
            info!(
                "order {} payment attempt {attempt} of {MAX_PAYMENT_ATTEMPTS}",
                state.order_id
            );

            let verdict = payment_activity(
                ctx,
                &ValidatePaymentInput {
                    order_id: state.order_id.clone(),
                    payment_code: payment_code.clone(),
                },
            )
            .await;

            let transient_message = match verdict {
                Ok(PaymentVerdict::Approved { .. }) => {
                    state.last_error = None;
                    approved = true;
                    record_payment_progress(ctx, state).await;
                    break;
                }
                Ok(PaymentVerdict::Declined { message, .. }) => {
                    state.last_error = Some(format!("payment failed: {message}"));
                    record_payment_progress(ctx, state).await;
                    break;
                }
                Ok(PaymentVerdict::Retry { message }) => message,
                // Activity-level failures (deadline, infrastructure) count
                // as one transient attempt, same as a gateway error.
                Err(err) => err.to_string(),
            };

            if attempt < MAX_PAYMENT_ATTEMPTS {
                state.last_error = Some(format!(
                    "payment failed (attempt {attempt} of {MAX_PAYMENT_ATTEMPTS}): \
                     {transient_message}"
                ));
                record_payment_progress(ctx, state).await;
                ctx.timer(payment_backoff(attempt)).await;
            } else {
                state.last_error = Some(format!(
                    "payment failed after {MAX_PAYMENT_ATTEMPTS} attempts: {transient_message}"
                ));
                record_payment_progress(ctx, state).await;
            }
        }

        if !approved {
            let reason = state
                .last_error
                .clone()
                .unwrap_or_else(|| "payment failed".to_string());
            return fail_with(ctx, state, reason).await;
        }

        // Confirm phase: books the seat rows, settles the counter, drops the
        // lock entries.
        if let Err(err) = order_activity::<_, ()>(
            ctx,
            CONFIRM_ORDER,
            &ConfirmOrderInput {
                order_id: state.order_id.clone(),
                flight_id: state.flight_id.clone(),
                seats: state.seats.clone(),
            },
        )
        .await
        {
            return fail_with(ctx, state, format!("confirmation failed: {err}")).await;
        }

        state.status = OrderStatus::Confirmed;
        info!(
            "order {} confirmed with seats {:?}",
            state.order_id, state.seats
        );
        Ok(Outcome::Confirmed)
    }
    .await;

    // Compensation: any non-confirmed exit releases whatever is still held,
    // on an abandoning activity so external cancellation cannot stop it.
    if state.status != OrderStatus::Confirmed && !state.seats.is_empty() {
        let resolution = ctx
            .activity(ActivityOptions {
                activity_type: RELEASE_SEATS.to_string(),
                input: ReleaseSeatsInput {
                    order_id: state.order_id.clone(),
                    flight_id: state.flight_id.clone(),
                    seats: state.seats.clone(),
                }
                .as_json_payload()?,
                start_to_close_timeout: Some(SEAT_ACTIVITY_TIMEOUT),
                retry_policy: Some(seat_retry_policy()),
                cancellation_type: ActivityCancellationType::Abandon,
                ..Default::default()
            })
            .await;
        match parse_activity_result::<()>(&resolution) {
            Ok(()) => info!(
                "compensation released seats {:?} for order {}",
                state.seats, state.order_id
            ),
            // The lock TTL and the reconciler are the fallback now.
            Err(err) => error!(
                "compensation failed to release seats for order {}: {err}",
                state.order_id
            ),
        }
    }

    // Drain buffered signals so nothing is left unhandled at completion.
    drain_channel(&mut update_chan);
    drain_channel(&mut pay_chan);
    drain_channel(&mut cancel_chan);

    match outcome? {
        Outcome::Confirmed => Ok(WfExitValue::Normal(BookingWorkflowResult {
            order_id: state.order_id,
            status: state.status,
            seats: state.seats,
        })),
        Outcome::Expired => Err(anyhow!("seat reservation expired")),
        Outcome::Canceled { external: true } => Ok(WfExitValue::Cancelled),
        Outcome::Canceled { external: false } => Err(anyhow!("booking canceled by user")),
        Outcome::Failed(reason) => Err(anyhow!(reason)),
    }
}

/// Mark the order failed (best effort) and produce the failed outcome.
async fn fail_with(
    ctx: &WfContext,
    state: &mut BookingState,
    reason: String,
) -> Result<Outcome, anyhow::Error> {
    state.status = OrderStatus::Failed;
    state.last_error = Some(reason.clone());
    if let Err(err) = order_activity::<_, ()>(
        ctx,
        FAIL_ORDER,
        &FailOrderInput {
            order_id: state.order_id.clone(),
            reason: reason.clone(),
        },
    )
    .await
    {
        error!("order {} could not be marked failed: {err}", state.order_id);
    }
    Ok(Outcome::Failed(reason))
}

/// Persist attempt count and last error; the status projection reads these.
async fn record_payment_progress(ctx: &WfContext, state: &BookingState) {
    if let Err(err) = order_activity::<_, ()>(
        ctx,
        RECORD_PAYMENT_ATTEMPT,
        &RecordPaymentAttemptInput {
            order_id: state.order_id.clone(),
            attempt: state.payment_attempts as i32,
            last_error: state.last_error.clone(),
        },
    )
    .await
    {
        warn!(
            "order {} payment progress not recorded: {err}",
            state.order_id
        );
    }
}

fn seat_retry_policy() -> RetryPolicy {
    RetryPolicy {
        initial_interval: Some(ProstDuration {
            seconds: 1,
            nanos: 0,
        }),
        backoff_coefficient: 2.0,
        maximum_interval: Some(ProstDuration {
            seconds: 10,
            nanos: 0,
        }),
        maximum_attempts: 3,
        ..Default::default()
    }
}

fn single_attempt_policy() -> RetryPolicy {
    RetryPolicy {
        maximum_attempts: 1,
        ..Default::default()
    }
}

async fn seat_activity<I>(ctx: &WfContext, activity_type: &str, input: &I) -> anyhow::Result<()>
where
    I: AsJsonPayloadExt,
{
    let resolution = ctx
        .activity(ActivityOptions {
            activity_type: activity_type.to_string(),
            input: input.as_json_payload()?,
            start_to_close_timeout: Some(SEAT_ACTIVITY_TIMEOUT),
            retry_policy: Some(seat_retry_policy()),
            cancellation_type: ActivityCancellationType::TryCancel,
            ..Default::default()
        })
        .await;
    parse_activity_result(&resolution)
}

async fn order_activity<I, O>(ctx: &WfContext, activity_type: &str, input: &I) -> anyhow::Result<O>
where
    I: AsJsonPayloadExt,
    O: FromJsonPayloadExt,
{
    let resolution = ctx
        .activity(ActivityOptions {
            activity_type: activity_type.to_string(),
            input: input.as_json_payload()?,
            start_to_close_timeout: Some(ORDER_ACTIVITY_TIMEOUT),
            retry_policy: Some(seat_retry_policy()),
            cancellation_type: ActivityCancellationType::TryCancel,
            ..Default::default()
        })
        .await;
    parse_activity_result(&resolution)
}

async fn payment_activity(
    ctx: &WfContext,
    input: &ValidatePaymentInput,
) -> anyhow::Result<PaymentVerdict> {
    let resolution = ctx
        .activity(ActivityOptions {
            activity_type: VALIDATE_PAYMENT.to_string(),
            input: input.as_json_payload()?,
            start_to_close_timeout: Some(PAYMENT_ACTIVITY_TIMEOUT),
            retry_policy: Some(single_attempt_policy()),
            cancellation_type: ActivityCancellationType::TryCancel,
            ..Default::default()
        })
        .await;
    parse_activity_result(&resolution)
}

/// Empty a signal channel without suspending; used right before completion.
fn drain_channel<S: Stream + Unpin>(chan: &mut S) {
    while chan.next().now_or_never().flatten().is_some() {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_id_is_derivable_both_ways() {
        let id = workflow_id("4f9d2c81-0000-0000-0000-000000000000");
        assert_eq!(id, "booking-4f9d2c81-0000-0000-0000-000000000000");
        assert_eq!(
            id.strip_prefix("booking-"),
            Some("4f9d2c81-0000-0000-0000-000000000000")
        );
    }

    #[test]
    fn payment_backoff_is_one_then_two_seconds() {
        assert_eq!(payment_backoff(1), Duration::from_secs(1));
        assert_eq!(payment_backoff(2), Duration::from_secs(2));
    }

    #[test]
    fn attempt_ceiling_matches_the_contract() {
        assert_eq!(MAX_PAYMENT_ATTEMPTS, 3);
    }
}
