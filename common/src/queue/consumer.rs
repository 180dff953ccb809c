// Job consumer implementation for NATS JetStream

use crate::errors::QueueError;
use crate::models::JobEnvelope;
use crate::queue::nats::NatsClient;
use async_nats::jetstream::consumer::PullConsumer;
use async_nats::jetstream::{AckKind, Message};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info, instrument, warn};

/// Job consumer trait for consuming jobs from the queue
#[async_trait::async_trait]
pub trait JobConsumer: Send + Sync {
    /// Start consuming jobs; returns when shutdown is requested
    async fn start(&self) -> Result<(), QueueError>;

    /// Request graceful shutdown
    fn shutdown(&self);
}

/// Callback processing one job. `Err` marks the job as failed.
pub type JobHandler = Arc<
    dyn Fn(JobEnvelope) -> futures::future::BoxFuture<'static, Result<(), anyhow::Error>>
        + Send
        + Sync,
>;

/// NATS-based job consumer implementation
pub struct NatsJobConsumer {
    consumer: PullConsumer,
    handler: JobHandler,
    shutdown_flag: Arc<AtomicBool>,
    shutdown_notify: Arc<Notify>,
}

impl NatsJobConsumer {
    #[instrument(skip(client, handler))]
    pub async fn new(client: &NatsClient, handler: JobHandler) -> Result<Self, QueueError> {
        info!("Creating NATS job consumer");

        let consumer = client.get_or_create_consumer().await?;

        Ok(Self {
            consumer,
            handler,
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            shutdown_notify: Arc::new(Notify::new()),
        })
    }

    /// Process a single message: ack on success, nak on job failure,
    /// terminate payloads that can never be decoded
    #[instrument(skip(self, message), fields(
        stream_sequence = ?message.info().map(|i| i.stream_sequence).ok(),
    ))]
    async fn process_message(&self, message: Message) -> Result<(), QueueError> {
        let envelope: JobEnvelope = match serde_json::from_slice(&message.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(error = %e, "Dropping undecodable job payload");
                message.ack_with(AckKind::Term).await.map_err(|e| {
                    QueueError::AckFailed(format!("Failed to terminate message: {}", e))
                })?;
                return Err(QueueError::DeserializationFailed(e.to_string()));
            }
        };

        let job_id = envelope.job_id;
        let job_name = envelope.job.name();
        info!(job_id = %job_id, job = job_name, "Processing job");

        match (self.handler)(envelope).await {
            Ok(()) => {
                message.ack().await.map_err(|e| {
                    QueueError::AckFailed(format!("Failed to acknowledge message: {}", e))
                })?;
                info!(job_id = %job_id, job = job_name, "Job processed successfully");
                Ok(())
            }
            Err(e) => {
                error!(job_id = %job_id, job = job_name, error = ?e, "Job failed");

                // Negative acknowledge - message will be redelivered
                message.ack_with(AckKind::Nak(None)).await.map_err(|e| {
                    QueueError::AckFailed(format!("Failed to negative acknowledge message: {}", e))
                })?;

                warn!(job_id = %job_id, "Message negatively acknowledged for redelivery");

                Err(QueueError::ConsumeFailed(format!("Job failed: {}", e)))
            }
        }
    }
}

#[async_trait::async_trait]
impl JobConsumer for NatsJobConsumer {
    #[instrument(skip(self))]
    async fn start(&self) -> Result<(), QueueError> {
        info!("Starting job consumer");

        let mut messages = self.consumer.messages().await.map_err(|e| {
            QueueError::ConsumeFailed(format!("Failed to create message stream: {}", e))
        })?;

        info!("Consumer started, waiting for messages");

        // One message at a time; dispatches share the worker's account context
        loop {
            if self.shutdown_flag.load(Ordering::Relaxed) {
                info!("Shutdown requested, stopping consumer");
                break;
            }

            tokio::select! {
                message_result = messages.next() => {
                    match message_result {
                        Some(Ok(message)) => {
                            if let Err(e) = self.process_message(message).await {
                                error!(error = %e, "Failed to process message");
                            }
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Error receiving message");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                        None => {
                            warn!("Message stream ended unexpectedly");
                            break;
                        }
                    }
                }
                _ = self.shutdown_notify.notified() => {
                    info!("Shutdown notification received");
                    break;
                }
                _ = tokio::time::sleep(Duration::from_secs(5)) => {
                    continue;
                }
            }
        }

        info!("Consumer stopped gracefully");
        Ok(())
    }

    fn shutdown(&self) {
        info!("Requesting consumer shutdown");
        self.shutdown_flag.store(true, Ordering::Relaxed);
        self.shutdown_notify.notify_waiters();
    }
}
