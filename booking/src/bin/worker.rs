//! Worker binary: hosts the booking and reconciliation workflows and every
//! activity behind them.

use std::sync::Arc;

use env_logger::Env;
use log::info;
use temporal_sdk::Worker;
use temporal_sdk_core::{init_worker, CoreRuntime};
use temporal_sdk_core_api::worker::WorkerVersioningStrategy;
use temporal_sdk_core_api::{telemetry::TelemetryOptionsBuilder, worker::WorkerConfigBuilder};

use booking::activities::{self, BookingActivities, ACTIVITIES};
use booking::config::Config;
use booking::reconciliation::{seat_reconciliation_workflow, RECONCILIATION_WORKFLOW_TYPE};
use booking::store::{connect_postgres, connect_redis};
use booking::workflow::{booking_workflow, BOOKING_WORKFLOW_TYPE};
use helpers::get_client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cfg = Config::from_env();
    info!("starting booking worker on task queue {}", cfg.temporal.task_queue);

    // Activities need both stores; fail fast if either is unreachable.
    let pool = connect_postgres(&cfg.database.url).await?;
    let redis = connect_redis(&cfg.redis.url).await?;

    ACTIVITIES.get_or_init(|| {
        Arc::new(BookingActivities::new(
            pool.clone(),
            redis.clone(),
            cfg.booking.clone(),
        ))
    });

    let client = get_client(&cfg.temporal.address, &cfg.temporal.namespace).await?;
    let telemetry_options = TelemetryOptionsBuilder::default().build()?;
    let runtime = CoreRuntime::new_assume_tokio(telemetry_options)?;
    let worker_config = WorkerConfigBuilder::default()
        .namespace(cfg.temporal.namespace.clone())
        .task_queue(cfg.temporal.task_queue.clone())
        .versioning_strategy(WorkerVersioningStrategy::None {
            build_id: "rust-sdk".to_owned(),
        })
        .build()?;
    let core_worker = init_worker(&runtime, worker_config, client)?;
    let mut worker = Worker::new_from_core(Arc::new(core_worker), cfg.temporal.task_queue.clone());

    worker.register_wf(BOOKING_WORKFLOW_TYPE, booking_workflow);
    worker.register_wf(RECONCILIATION_WORKFLOW_TYPE, seat_reconciliation_workflow);

    worker.register_activity(activities::RESERVE_SEATS, activities::reserve_seats);
    worker.register_activity(activities::RELEASE_SEATS, activities::release_seats);
    worker.register_activity(
        activities::UPDATE_SEAT_SELECTION,
        activities::update_seat_selection,
    );
    worker.register_activity(activities::CREATE_ORDER, activities::create_order);
    worker.register_activity(activities::UPDATE_ORDER_SEATS, activities::update_order_seats);
    worker.register_activity(
        activities::UPDATE_ORDER_STATUS,
        activities::update_order_status,
    );
    worker.register_activity(
        activities::RECORD_PAYMENT_ATTEMPT,
        activities::record_payment_attempt,
    );
    worker.register_activity(activities::CONFIRM_ORDER, activities::confirm_order);
    worker.register_activity(activities::FAIL_ORDER, activities::fail_order);
    worker.register_activity(activities::EXPIRE_ORDER, activities::expire_order);
    worker.register_activity(activities::VALIDATE_PAYMENT, activities::validate_payment);
    worker.register_activity(activities::ALL_FLIGHT_IDS, activities::all_flight_ids);
    worker.register_activity(
        activities::RECONCILE_SEAT_LOCKS,
        activities::reconcile_seat_locks,
    );

    info!("registered workflows and activities");
    worker.run().await?;
    Ok(())
}
