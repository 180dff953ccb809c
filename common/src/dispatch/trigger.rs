// Trigger interface and the HTTP trigger backend

use crate::config::{Settings, TriggersConfig};
use crate::dispatch::context::DispatchContext;
use crate::errors::{DomainError, TriggerError};
use crate::models::{Message, TriggerKind};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

pub type TriggerResult = Result<(), TriggerError>;

/// Everything a trigger sees for one invocation
#[derive(Debug, Clone, Copy)]
pub struct TriggerRequest<'a> {
    pub message: &'a Message,
    pub arguments: &'a Value,
    pub accounts: &'a DispatchContext,
    pub settings: &'a Settings,
}

/// Builds and submits a proposal for one call kind
#[async_trait]
pub trait Trigger: Send + Sync {
    async fn trigger(&self, request: TriggerRequest<'_>) -> TriggerResult;
}

/// Selects the trigger for a call kind
pub trait TriggerFactory: Send + Sync {
    fn trigger_for(&self, kind: TriggerKind) -> Arc<dyn Trigger>;
}

/// One trigger per call kind
#[derive(Clone)]
pub struct TriggerSet {
    pub create: Arc<dyn Trigger>,
    pub in_progress: Arc<dyn Trigger>,
    pub finish: Arc<dyn Trigger>,
    pub result: Arc<dyn Trigger>,
}

impl TriggerFactory for TriggerSet {
    fn trigger_for(&self, kind: TriggerKind) -> Arc<dyn Trigger> {
        match kind {
            TriggerKind::Create => Arc::clone(&self.create),
            TriggerKind::InProgress => Arc::clone(&self.in_progress),
            TriggerKind::Finish => Arc::clone(&self.finish),
            TriggerKind::Result => Arc::clone(&self.result),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BackendError {
    error: String,
}

/// Trigger that forwards the call to an external trigger service at
/// `{base_url}/{kind}`.
///
/// 2xx is success. 409/422 carrying a known domain code in `{"error": ...}`
/// is a business-rule condition; every other response is unexpected.
pub struct HttpTrigger {
    client: Client,
    kind: TriggerKind,
    url: String,
}

impl HttpTrigger {
    /// Build the four HTTP triggers sharing one client
    pub fn trigger_set(config: &TriggersConfig) -> Result<TriggerSet, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let base_url = config.base_url.trim_end_matches('/');
        let build = |kind: TriggerKind| -> Arc<dyn Trigger> {
            Arc::new(HttpTrigger {
                client: client.clone(),
                kind,
                url: format!("{}/{}", base_url, kind),
            })
        };

        Ok(TriggerSet {
            create: build(TriggerKind::Create),
            in_progress: build(TriggerKind::InProgress),
            finish: build(TriggerKind::Finish),
            result: build(TriggerKind::Result),
        })
    }
}

#[async_trait]
impl Trigger for HttpTrigger {
    #[instrument(skip_all, fields(kind = %self.kind, url = %self.url))]
    async fn trigger(&self, request: TriggerRequest<'_>) -> TriggerResult {
        let body = json!({
            "kind": self.kind,
            "message": request.message.to_value(),
            "arguments": request.arguments,
            "proposer": request.accounts.proposing_account(),
            "approver": request.accounts.approving_account(),
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Trigger request failed: {}", e))?;

        let status = response.status();
        if status.is_success() {
            debug!(status = %status, "Trigger accepted");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        if matches!(status, StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY) {
            if let Some(domain) = serde_json::from_str::<BackendError>(&text)
                .ok()
                .and_then(|body| DomainError::from_code(&body.error))
            {
                return Err(domain.into());
            }
        }

        Err(anyhow::anyhow!("Trigger backend returned {}: {}", status, text).into())
    }
}
