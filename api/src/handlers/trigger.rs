use axum::{body::Bytes, extract::State};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;
use common::models::{Message, QueuedJob};

#[derive(Debug, Serialize)]
pub struct Enqueued {
    pub job_id: Uuid,
}

/// Accept a message and enqueue it for the worker.
///
/// The message is validated here so malformed payloads never reach the
/// queue. The endpoint's configured accounts travel with the job as
/// overrides.
#[tracing::instrument(skip(state, body))]
pub async fn enqueue_message(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<SuccessResponse<Enqueued>, ErrorResponse> {
    let value: Value = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Rejected trigger payload that is not JSON");
        ErrorResponse::new("validation_error", format!("Invalid JSON body: {}", e))
    })?;

    let message = Message::from_value(value).map_err(|e| {
        tracing::warn!(error = %e, "Rejected invalid trigger message");
        ErrorResponse::new("validation_error", e.to_string())
    })?;

    let call = message.call.clone();
    let job = QueuedJob::Process {
        message,
        approver: state.approver.clone(),
        proposer: state.proposer.clone(),
    };

    let job_id = state.publisher.publish_with_retry(job).await.map_err(|e| {
        tracing::error!(error = %e, call = %call, "Failed to enqueue message");
        ErrorResponse::new("queue_unavailable", "Message could not be enqueued")
            .with_details(serde_json::json!({ "reason": e.to_string() }))
    })?;

    tracing::info!(job_id = %job_id, call = %call, "Message enqueued");
    Ok(SuccessResponse::new(Enqueued { job_id }))
}
