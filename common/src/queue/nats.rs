// NATS JetStream client implementation for the job queue

use crate::config::Settings;
use crate::errors::QueueError;
use async_nats::jetstream::{
    consumer::PullConsumer,
    stream::{Config as StreamConfig, RetentionPolicy, Stream},
    Context as JetStreamContext,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};

/// Subject root for all bookie jobs; each named queue is one subject below it
pub const SUBJECT_PREFIX: &str = "bookie.jobs";

/// NATS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL (e.g., "nats://localhost:4222")
    pub url: String,
    /// Stream name for the job queue
    pub stream_name: String,
    /// Consumer name for workers
    pub consumer_name: String,
    /// Queue this client publishes to / consumes from
    pub queue: String,
    /// Maximum age for messages in the stream (in seconds)
    pub max_age_seconds: u64,
    /// Maximum number of messages to retain
    pub max_messages: i64,
    /// Maximum number of delivery attempts
    pub max_deliver: i64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            stream_name: "BOOKIE".to_string(),
            consumer_name: "bookie-workers".to_string(),
            queue: "default".to_string(),
            max_age_seconds: 86400, // 24 hours
            max_messages: 1_000_000,
            max_deliver: 5,
        }
    }
}

impl NatsConfig {
    /// Build from settings for the given queue name
    pub fn from_settings(settings: &Settings, queue: &str) -> Self {
        Self {
            url: settings.nats.url.clone(),
            stream_name: settings.nats.stream_name.clone(),
            consumer_name: format!("{}-{}", settings.nats.consumer_name, queue),
            queue: queue.to_string(),
            ..Self::default()
        }
    }

    /// Subject jobs for this queue are published on
    pub fn subject(&self) -> String {
        queue_subject(&self.queue)
    }
}

pub fn queue_subject(queue: &str) -> String {
    format!("{}.{}", SUBJECT_PREFIX, queue)
}

/// NATS JetStream client
pub struct NatsClient {
    jetstream: JetStreamContext,
    config: NatsConfig,
}

impl NatsClient {
    /// Create a new NATS client and connect to the server
    #[instrument(skip(config), fields(url = %config.url))]
    pub async fn new(config: NatsConfig) -> Result<Self, QueueError> {
        info!("Connecting to NATS server");

        let client = async_nats::connect(&config.url)
            .await
            .map_err(|e| QueueError::Connection(format!("Failed to connect to NATS: {}", e)))?;

        info!("Connected to NATS server successfully");

        let jetstream = async_nats::jetstream::new(client);

        Ok(Self {
            jetstream,
            config,
        })
    }

    /// Initialize the job stream with work-queue retention
    #[instrument(skip(self))]
    pub async fn initialize_stream(&self) -> Result<Stream, QueueError> {
        info!(
            stream_name = %self.config.stream_name,
            "Initializing JetStream stream"
        );

        let stream_config = StreamConfig {
            name: self.config.stream_name.clone(),
            subjects: vec![format!("{}.>", SUBJECT_PREFIX)],
            retention: RetentionPolicy::WorkQueue, // Messages deleted after acknowledgment
            max_age: Duration::from_secs(self.config.max_age_seconds),
            max_messages: self.config.max_messages,
            ..Default::default()
        };

        let stream = self
            .jetstream
            .get_or_create_stream(stream_config)
            .await
            .map_err(|e| QueueError::StreamCreation(format!("Failed to create stream: {}", e)))?;

        info!(
            stream_name = %self.config.stream_name,
            "Stream initialized successfully"
        );

        Ok(stream)
    }

    /// Create or get the durable consumer for this queue
    #[instrument(skip(self))]
    pub async fn get_or_create_consumer(&self) -> Result<PullConsumer, QueueError> {
        info!(
            consumer_name = %self.config.consumer_name,
            queue = %self.config.queue,
            "Creating consumer"
        );

        let stream = self
            .jetstream
            .get_stream(&self.config.stream_name)
            .await
            .map_err(|e| QueueError::StreamNotFound(format!("Stream not found: {}", e)))?;

        let consumer_config = async_nats::jetstream::consumer::pull::Config {
            durable_name: Some(self.config.consumer_name.clone()),
            filter_subject: self.config.subject(),
            ack_policy: async_nats::jetstream::consumer::AckPolicy::Explicit,
            max_deliver: self.config.max_deliver,
            ack_wait: Duration::from_secs(300), // 5 minutes timeout
            ..Default::default()
        };

        let consumer = stream
            .get_or_create_consumer(&self.config.consumer_name, consumer_config)
            .await
            .map_err(|e| {
                QueueError::ConsumerCreation(format!("Failed to create consumer: {}", e))
            })?;

        info!(
            consumer_name = %self.config.consumer_name,
            "Consumer created successfully"
        );

        Ok(consumer)
    }

    pub fn jetstream(&self) -> &JetStreamContext {
        &self.jetstream
    }

    pub fn config(&self) -> &NatsConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nats_config_default() {
        let config = NatsConfig::default();
        assert_eq!(config.url, "nats://localhost:4222");
        assert_eq!(config.stream_name, "BOOKIE");
        assert_eq!(config.subject(), "bookie.jobs.default");
        assert_eq!(config.max_deliver, 5);
    }

    #[test]
    fn test_nats_config_from_settings_names_queue() {
        let settings = Settings::default();
        let config = NatsConfig::from_settings(&settings, "events");
        assert_eq!(config.queue, "events");
        assert_eq!(config.consumer_name, "bookie-workers-events");
        assert_eq!(config.subject(), "bookie.jobs.events");
    }
}
