//! Approve command - enqueue a self-approval pass.

use anyhow::{Context, Result};
use clap::Args;
use uuid::Uuid;

use common::bootstrap;
use common::config::Settings;
use common::models::QueuedJob;
use common::queue::{JobPublisher, NatsJobPublisher};

/// Arguments for the approve command.
#[derive(Debug, Args)]
pub struct ApproveArgs {
    /// Account whose proposals should be approved (defaults to configuration).
    #[arg(long)]
    pub proposer: Option<String>,

    /// Account that signs the approvals (defaults to configuration).
    #[arg(long)]
    pub approver: Option<String>,

    /// Queue to enqueue onto (defaults to `worker.queue`).
    #[arg(long)]
    pub queue: Option<String>,
}

/// Build the approval job, filling unset accounts from configuration.
#[must_use]
pub fn approval_job(args: &ApproveArgs, config: &Settings) -> QueuedJob {
    QueuedJob::Approve {
        approver: args
            .approver
            .clone()
            .or_else(|| config.bookie.approver.clone()),
        proposer: args
            .proposer
            .clone()
            .or_else(|| config.bookie.proposer.clone()),
    }
}

/// Publish the approval job.
///
/// # Errors
///
/// Returns an error if the queue does not accept the job.
pub async fn enqueue(publisher: &dyn JobPublisher, job: QueuedJob) -> Result<Uuid> {
    publisher
        .publish_with_retry(job)
        .await
        .context("Failed to enqueue approval job")
}

/// Execute the approve command.
///
/// # Errors
///
/// Returns an error if NATS is unreachable or the job cannot be published.
pub async fn execute(args: ApproveArgs, config: &Settings) -> Result<()> {
    let queue = args
        .queue
        .clone()
        .unwrap_or_else(|| config.worker.queue.clone());
    let job = approval_job(&args, config);

    let nats_client = bootstrap::init_nats_client(config, &queue).await?;
    nats_client.initialize_stream().await?;
    let publisher = NatsJobPublisher::new(nats_client);

    let job_id = enqueue(&publisher, job).await?;
    tracing::info!(job_id = %job_id, queue = %queue, "Approval job enqueued");
    println!("Approval job {job_id} enqueued on '{queue}'");
    Ok(())
}
