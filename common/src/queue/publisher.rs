// Job publisher implementation for NATS JetStream

use crate::errors::QueueError;
use crate::models::{JobEnvelope, QueuedJob};
use crate::queue::nats::NatsClient;
use crate::retry::{ExponentialBackoff, RetryStrategy};
use crate::telemetry;
use async_nats::jetstream::context::PublishAckFuture;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// JobPublisher trait for publishing jobs to the queue
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait JobPublisher: Send + Sync {
    /// Publish a job, retrying transient failures, and return its job id
    async fn publish_with_retry(&self, job: QueuedJob) -> Result<Uuid, QueueError>;
}

/// NATS-based job publisher implementation
pub struct NatsJobPublisher {
    client: NatsClient,
    publish_timeout: Duration,
    retry_strategy: ExponentialBackoff,
}

impl NatsJobPublisher {
    pub fn new(client: NatsClient) -> Self {
        Self {
            client,
            publish_timeout: Duration::from_secs(5),
            retry_strategy: ExponentialBackoff::new(),
        }
    }

    async fn publish_envelope(&self, envelope: &JobEnvelope) -> Result<(), QueueError> {
        let payload = serde_json::to_vec(envelope).map_err(|e| {
            QueueError::SerializationFailed(format!("Failed to serialize job: {}", e))
        })?;

        let subject = self.client.config().subject();

        // Job id doubles as the JetStream deduplication key
        let mut headers = async_nats::HeaderMap::new();
        headers.insert("Nats-Msg-Id", envelope.job_id.to_string().as_str());
        headers.insert("Job-Kind", envelope.job.name());

        let publish_future: PublishAckFuture = self
            .client
            .jetstream()
            .publish_with_headers(subject.clone(), headers, payload.into())
            .await
            .map_err(|e| QueueError::PublishFailed(format!("Failed to publish message: {}", e)))?;

        match tokio::time::timeout(self.publish_timeout, publish_future).await {
            Ok(Ok(_ack)) => {
                info!(subject = %subject, "Job published successfully");
                telemetry::record_job_enqueued(envelope.job.name());
                Ok(())
            }
            Ok(Err(e)) => Err(QueueError::PublishFailed(format!(
                "Failed to get publish acknowledgment: {}",
                e
            ))),
            Err(_) => Err(QueueError::Timeout(format!(
                "Publish acknowledgment timeout after {:?}",
                self.publish_timeout
            ))),
        }
    }
}

#[async_trait::async_trait]
impl JobPublisher for NatsJobPublisher {
    #[instrument(skip_all, fields(job = job.name()))]
    async fn publish_with_retry(&self, job: QueuedJob) -> Result<Uuid, QueueError> {
        // Same envelope on every attempt so JetStream dedups a late ack
        let envelope = JobEnvelope::new(job);
        info!(job_id = %envelope.job_id, "Publishing job to queue");
        let mut attempt = 0;

        loop {
            match self.publish_envelope(&envelope).await {
                Ok(()) => return Ok(envelope.job_id),
                Err(e) => match self.retry_strategy.next_delay(attempt) {
                    Some(delay) => {
                        warn!(
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Publish failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(e),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;
    use serde_json::json;

    #[test]
    fn test_envelope_serialization_preserves_job() {
        let message = Message::from_value(json!({"id": "x1", "call": "result"})).unwrap();
        let envelope = JobEnvelope::new(QueuedJob::Process {
            message,
            approver: None,
            proposer: Some("init0".to_string()),
        });

        let bytes = serde_json::to_vec(&envelope).unwrap();
        let decoded: JobEnvelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[tokio::test]
    async fn test_publisher_is_driven_through_publish_with_retry() {
        let job_id = Uuid::new_v4();
        let mut publisher = MockJobPublisher::new();
        publisher
            .expect_publish_with_retry()
            .times(1)
            .returning(move |_| Ok(job_id));

        let publisher: Box<dyn JobPublisher> = Box::new(publisher);
        let job = QueuedJob::Approve {
            approver: Some("init1".to_string()),
            proposer: None,
        };
        assert_eq!(publisher.publish_with_retry(job).await.unwrap(), job_id);
    }
}
