//! Registers the seat reconciliation sweep as a Temporal cron workflow.

use env_logger::Env;
use log::info;
use temporal_client::{WorkflowClientTrait, WorkflowOptions};

use booking::config::Config;
use booking::reconciliation::{RECONCILIATION_WORKFLOW_ID, RECONCILIATION_WORKFLOW_TYPE};
use helpers::get_client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cfg = Config::from_env();
    let client = get_client(&cfg.temporal.address, &cfg.temporal.namespace).await?;

    info!(
        "scheduling {RECONCILIATION_WORKFLOW_TYPE} with cron {:?}",
        cfg.booking.reconcile_cron
    );

    let options = WorkflowOptions {
        cron_schedule: Some(cfg.booking.reconcile_cron.clone()),
        ..Default::default()
    };

    let start_res = client
        .start_workflow(
            vec![],
            cfg.temporal.task_queue.clone(),
            RECONCILIATION_WORKFLOW_ID.to_string(),
            RECONCILIATION_WORKFLOW_TYPE.to_string(),
            None,
            options,
        )
        .await?;

    println!(
        "Scheduled reconciliation workflow id={RECONCILIATION_WORKFLOW_ID} run_id={}",
        start_res.run_id
    );
    Ok(())
}
