// Data models for inbound messages, queued jobs and chain entities

use crate::errors::MessageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Inbound job description as received from the HTTP endpoint or a replay file.
///
/// Wire shape: `{"id": any, "call": string, "arguments": any,
/// "approver"?: string, "proposer"?: string}`. Keys outside that set are kept
/// in `extra` so the message reaches the trigger unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Message {
    pub id: Value,
    pub call: String,
    pub arguments: Value,
    pub approver: Option<String>,
    pub proposer: Option<String>,
    pub extra: Map<String, Value>,
}

impl Message {
    /// Validate a raw JSON value against the message contract
    pub fn from_value(value: Value) -> Result<Self, MessageError> {
        let Value::Object(mut map) = value else {
            return Err(MessageError::NotAnObject);
        };

        let id = map.remove("id").ok_or(MessageError::MissingId)?;
        let call = match map.remove("call") {
            Some(Value::String(call)) => call,
            Some(_) => return Err(MessageError::InvalidCall),
            None => return Err(MessageError::MissingCall),
        };
        let arguments = map.remove("arguments").unwrap_or(Value::Null);
        let approver = take_account(&mut map, "approver")?;
        let proposer = take_account(&mut map, "proposer")?;

        Ok(Self {
            id,
            call,
            arguments,
            approver,
            proposer,
            extra: map,
        })
    }

    /// The routing key, read case-insensitively
    pub fn call_kind(&self) -> CallKind {
        CallKind::parse(&self.call)
    }

    /// Full message as a JSON object, the shape triggers and logs see
    pub fn to_value(&self) -> Value {
        Value::from(self.clone())
    }
}

fn take_account(
    map: &mut Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, MessageError> {
    match map.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(account)) => Ok(Some(account)),
        Some(_) => Err(MessageError::InvalidAccount { field }),
    }
}

impl TryFrom<Value> for Message {
    type Error = MessageError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<Message> for Value {
    fn from(message: Message) -> Self {
        let mut map = message.extra;
        map.insert("id".to_string(), message.id);
        map.insert("call".to_string(), Value::String(message.call));
        map.insert("arguments".to_string(), message.arguments);
        if let Some(approver) = message.approver {
            map.insert("approver".to_string(), Value::String(approver));
        }
        if let Some(proposer) = message.proposer {
            map.insert("proposer".to_string(), Value::String(proposer));
        }
        Value::Object(map)
    }
}

/// The four call kinds that construct proposals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Create,
    InProgress,
    Finish,
    Result,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 4] = [
        TriggerKind::Create,
        TriggerKind::InProgress,
        TriggerKind::Finish,
        TriggerKind::Result,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Create => "create",
            TriggerKind::InProgress => "in_progress",
            TriggerKind::Finish => "finish",
            TriggerKind::Result => "result",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing decision for a message's `call` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    Trigger(TriggerKind),
    /// Explicit `unknown` call: accepted and ignored
    Unknown,
    /// Anything else, lower-cased
    Unrecognized(String),
}

impl CallKind {
    pub fn parse(call: &str) -> Self {
        let call = call.to_lowercase();
        match call.as_str() {
            "create" => CallKind::Trigger(TriggerKind::Create),
            "in_progress" => CallKind::Trigger(TriggerKind::InProgress),
            "finish" => CallKind::Trigger(TriggerKind::Finish),
            "result" => CallKind::Trigger(TriggerKind::Result),
            "unknown" => CallKind::Unknown,
            _ => CallKind::Unrecognized(call),
        }
    }

    pub fn trigger_kind(&self) -> Option<TriggerKind> {
        match self {
            CallKind::Trigger(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CallKind::Trigger(kind) => kind.as_str(),
            CallKind::Unknown => "unknown",
            CallKind::Unrecognized(call) => call,
        }
    }
}

/// Work item carried on the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum QueuedJob {
    /// Dispatch an inbound message to its trigger
    Process {
        message: Message,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        approver: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        proposer: Option<String>,
    },
    /// Approve pending proposals created by our own proposer
    Approve {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        approver: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        proposer: Option<String>,
    },
}

impl QueuedJob {
    pub fn name(&self) -> &'static str {
        match self {
            QueuedJob::Process { .. } => "process",
            QueuedJob::Approve { .. } => "approve",
        }
    }
}

/// Queue envelope around a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    /// Unique job id, also used as the queue deduplication key
    pub job_id: Uuid,
    /// Timestamp when the job was enqueued
    pub enqueued_at: DateTime<Utc>,
    pub job: QueuedJob,
}

impl JobEnvelope {
    pub fn new(job: QueuedJob) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            enqueued_at: Utc::now(),
            job,
        }
    }
}

/// On-chain account identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
}

/// Pending proposal as seen by the reconciler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    /// Account id of the creator
    pub proposer: String,
    #[serde(default)]
    pub available_active_approvals: Vec<String>,
}

impl Proposal {
    pub fn is_approved_by(&self, account_id: &str) -> bool {
        self.available_active_approvals
            .iter()
            .any(|approval| approval == account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_from_value_keeps_extra_fields() {
        let message = Message::from_value(json!({
            "id": "abc",
            "call": "Create",
            "arguments": {"season": "2018"},
            "approver": "init1",
            "timestamp": 12
        }))
        .unwrap();

        assert_eq!(message.id, json!("abc"));
        assert_eq!(message.arguments, json!({"season": "2018"}));
        assert_eq!(message.approver.as_deref(), Some("init1"));
        assert_eq!(message.proposer, None);
        assert_eq!(message.extra.get("timestamp"), Some(&json!(12)));
        assert_eq!(message.to_value()["timestamp"], json!(12));
    }

    #[test]
    fn test_message_requires_id() {
        let err = Message::from_value(json!({"call": "create"})).unwrap_err();
        assert_eq!(err, MessageError::MissingId);
    }

    #[test]
    fn test_message_accepts_null_id_and_missing_arguments() {
        let message = Message::from_value(json!({"id": null, "call": "unknown"})).unwrap();
        assert_eq!(message.id, Value::Null);
        assert_eq!(message.arguments, Value::Null);
    }

    #[test]
    fn test_message_rejects_bad_shapes() {
        assert_eq!(
            Message::from_value(json!([1, 2])).unwrap_err(),
            MessageError::NotAnObject
        );
        assert_eq!(
            Message::from_value(json!({"id": 1})).unwrap_err(),
            MessageError::MissingCall
        );
        assert_eq!(
            Message::from_value(json!({"id": 1, "call": 5})).unwrap_err(),
            MessageError::InvalidCall
        );
        assert_eq!(
            Message::from_value(json!({"id": 1, "call": "create", "approver": 7})).unwrap_err(),
            MessageError::InvalidAccount { field: "approver" }
        );
    }

    #[test]
    fn test_call_kind_is_case_insensitive() {
        assert_eq!(
            CallKind::parse("IN_PROGRESS"),
            CallKind::Trigger(TriggerKind::InProgress)
        );
        assert_eq!(CallKind::parse("Unknown"), CallKind::Unknown);
        assert_eq!(CallKind::parse("Unknown").trigger_kind(), None);
        assert_eq!(
            CallKind::parse("Result").trigger_kind(),
            Some(TriggerKind::Result)
        );
        assert_eq!(
            CallKind::parse("Bogus"),
            CallKind::Unrecognized("bogus".to_string())
        );
    }

    #[test]
    fn test_queued_job_wire_shape() {
        let message = Message::from_value(json!({"id": 1, "call": "finish"})).unwrap();
        let job = QueuedJob::Process {
            message,
            approver: Some("init2".to_string()),
            proposer: None,
        };

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["job"], "process");
        assert_eq!(value["message"]["call"], "finish");
        assert_eq!(value["approver"], "init2");
        assert!(value.get("proposer").is_none());
    }

    #[test]
    fn test_queued_job_rejects_message_without_id() {
        let raw = json!({"job": "process", "message": {"call": "create"}});
        assert!(serde_json::from_value::<QueuedJob>(raw).is_err());
    }

    #[test]
    fn test_proposal_approval_lookup() {
        let proposal: Proposal = serde_json::from_value(json!({
            "id": "1.10.4",
            "proposer": "1.2.7",
            "available_active_approvals": ["1.2.8"],
            "expiration_time": "2018-05-01T00:00:00"
        }))
        .unwrap();

        assert!(proposal.is_approved_by("1.2.8"));
        assert!(!proposal.is_approved_by("1.2.7"));
    }
}
