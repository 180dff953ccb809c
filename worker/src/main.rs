// Worker binary entry point
// Unlocks the wallet, then processes queued dispatch and approval jobs

use anyhow::Result;
use clap::Parser;
use common::bootstrap;
use common::chain::ChainClient;
use common::telemetry;
use common::worker::WorkerJobConsumer;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

/// Start the queue worker that processes received messages
#[derive(Debug, Parser)]
#[command(name = "worker", version, about)]
struct Args {
    /// Queue to consume (defaults to `worker.queue` from configuration)
    queue: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = bootstrap::load_settings()?;

    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.tracing_endpoint.as_deref(),
    )?;
    telemetry::init_metrics(settings.observability.worker_metrics_port)?;

    let queue = args.queue.unwrap_or_else(|| settings.worker.queue.clone());
    info!(queue = %queue, "Starting bookie worker");

    // Refuse to start without an unlocked wallet
    let chain = bootstrap::init_chain_client(&settings).await.map_err(|e| {
        error!(severity = "critical", error = ?e, "Wallet initialization failed");
        e
    })?;

    let triggers = bootstrap::init_triggers(&settings)?;
    let nats_client = bootstrap::init_nats_client(&settings, &queue).await?;
    nats_client.initialize_stream().await?;

    let settings = Arc::new(settings);
    let runner = Arc::new(bootstrap::init_job_runner(
        Arc::clone(&settings),
        chain as Arc<dyn ChainClient>,
        triggers,
    ));

    let worker_consumer = Arc::new(WorkerJobConsumer::new(&nats_client, runner).await?);

    info!("Worker consumer created, starting job processing");

    let consumer = Arc::clone(&worker_consumer);
    let worker_handle = tokio::spawn(async move {
        if let Err(e) = consumer.start().await {
            error!(error = %e, "Worker consumer error");
        }
    });

    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, initiating graceful shutdown"),
        Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
    }

    worker_consumer.shutdown();
    info!("Waiting for in-flight job to complete");
    if let Err(e) = worker_handle.await {
        error!(error = %e, "Worker consumer task failed");
    }

    telemetry::shutdown_tracer();
    info!("Worker shutdown complete");
    Ok(())
}
