// Worker job consumer: wires the job runner into the NATS consumer

use crate::errors::QueueError;
use crate::models::JobEnvelope;
use crate::queue::{JobConsumer, JobHandler, NatsClient, NatsJobConsumer};
use crate::worker::runner::JobRunner;
use std::sync::Arc;
use tracing::{info, instrument};

/// Worker job consumer that processes jobs from the queue
pub struct WorkerJobConsumer {
    consumer: NatsJobConsumer,
}

impl WorkerJobConsumer {
    #[instrument(skip_all)]
    pub async fn new(nats_client: &NatsClient, runner: Arc<JobRunner>) -> Result<Self, QueueError> {
        info!("Creating worker job consumer");

        let consumer = NatsJobConsumer::new(nats_client, Self::create_handler(runner)).await?;

        Ok(Self { consumer })
    }

    /// Start consuming jobs from the queue
    pub async fn start(&self) -> Result<(), QueueError> {
        info!("Starting worker job consumer");
        self.consumer.start().await
    }

    /// Request graceful shutdown
    pub fn shutdown(&self) {
        info!("Requesting worker shutdown");
        self.consumer.shutdown();
    }

    fn create_handler(runner: Arc<JobRunner>) -> JobHandler {
        Arc::new(move |envelope: JobEnvelope| {
            let runner = Arc::clone(&runner);
            Box::pin(async move { runner.run(envelope).await.map_err(anyhow::Error::from) })
        })
    }
}
