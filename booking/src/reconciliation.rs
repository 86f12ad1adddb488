//! Scheduled sweep that releases orphaned seat locks.
//!
//! Runs as a cron workflow: one `all_flight_ids` activity, then one
//! `reconcile_seat_locks` activity per flight. Per-flight failures are logged
//! and skipped so a single bad flight never starves the rest of the sweep.

use std::time::Duration;

use log::{error, info};
use prost_wkt_types::Duration as ProstDuration;
use temporal_sdk::{ActivityOptions, WfContext, WfExitValue, WorkflowResult};
use temporal_sdk_core::protos::temporal::api::common::v1::RetryPolicy;
use temporal_sdk_core_protos::coresdk::{
    workflow_commands::ActivityCancellationType, AsJsonPayloadExt,
};

use helpers::parse_activity_result;

use crate::activities::{ReconcileSeatLocksInput, ALL_FLIGHT_IDS, RECONCILE_SEAT_LOCKS};

pub const RECONCILIATION_WORKFLOW_TYPE: &str = "seat_reconciliation_workflow";

/// Stable workflow id for the cron schedule so at most one sweep is
/// registered per deployment.
pub const RECONCILIATION_WORKFLOW_ID: &str = "seat-reconciliation";

const ACTIVITY_TIMEOUT: Duration = Duration::from_secs(30);

fn reconcile_retry_policy() -> RetryPolicy {
    RetryPolicy {
        initial_interval: Some(ProstDuration {
            seconds: 1,
            nanos: 0,
        }),
        maximum_attempts: 3,
        ..Default::default()
    }
}

pub async fn seat_reconciliation_workflow(ctx: WfContext) -> WorkflowResult<u64> {
    let resolution = ctx
        .activity(ActivityOptions {
            activity_type: ALL_FLIGHT_IDS.to_string(),
            input: "".as_json_payload()?,
            start_to_close_timeout: Some(ACTIVITY_TIMEOUT),
            retry_policy: Some(reconcile_retry_policy()),
            cancellation_type: ActivityCancellationType::TryCancel,
            ..Default::default()
        })
        .await;
    let flight_ids: Vec<String> = parse_activity_result(&resolution)?;

    if flight_ids.is_empty() {
        info!("reconciliation: no flights to sweep");
        return Ok(WfExitValue::Normal(0));
    }

    let mut released = 0u64;
    for flight_id in &flight_ids {
        let resolution = ctx
            .activity(ActivityOptions {
                activity_type: RECONCILE_SEAT_LOCKS.to_string(),
                input: ReconcileSeatLocksInput {
                    flight_id: flight_id.clone(),
                }
                .as_json_payload()?,
                start_to_close_timeout: Some(ACTIVITY_TIMEOUT),
                retry_policy: Some(reconcile_retry_policy()),
                cancellation_type: ActivityCancellationType::TryCancel,
                ..Default::default()
            })
            .await;
        match parse_activity_result::<u64>(&resolution) {
            Ok(count) => released += count,
            // Best effort: move on to the next flight.
            Err(err) => error!("reconciliation failed for flight {flight_id}: {err}"),
        }
    }

    info!(
        "reconciliation swept {} flight(s), released {released} lock(s)",
        flight_ids.len()
    );
    Ok(WfExitValue::Normal(released))
}
