// Error handling framework

use thiserror::Error;

/// Inbound message contract violations.
///
/// These are precondition failures of the message shape and are kept apart
/// from the business-rule conditions a trigger may report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("Message must be a JSON object")]
    NotAnObject,

    #[error("Message is missing the required 'id' field")]
    MissingId,

    #[error("Message is missing the required 'call' field")]
    MissingCall,

    #[error("Message field 'call' must be a string")]
    InvalidCall,

    #[error("Message field '{field}' must be a string account name")]
    InvalidAccount { field: &'static str },
}

/// Expected business-rule conditions raised by triggers.
///
/// The dispatcher absorbs all of these: the message counts as handled.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainError {
    #[error("Event does not exist")]
    EventDoesNotExist,

    #[error("Event group is closed")]
    EventGroupClosed,

    #[error("Event cannot be opened")]
    EventCannotOpen,

    #[error("Insufficient incidents")]
    InsufficientIncidents,

    #[error("Insufficient equal results")]
    InsufficientEqualResults,
}

impl DomainError {
    pub const ALL: [DomainError; 5] = [
        DomainError::EventDoesNotExist,
        DomainError::EventGroupClosed,
        DomainError::EventCannotOpen,
        DomainError::InsufficientIncidents,
        DomainError::InsufficientEqualResults,
    ];

    /// Stable wire code used by trigger backends
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::EventDoesNotExist => "event_does_not_exist",
            DomainError::EventGroupClosed => "event_group_closed",
            DomainError::EventCannotOpen => "event_cannot_open",
            DomainError::InsufficientIncidents => "insufficient_incidents",
            DomainError::InsufficientEqualResults => "insufficient_equal_results",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.code() == code)
    }
}

/// Failure returned by a trigger invocation
#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// Chain, wallet and account errors
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("RPC call '{method}' failed: {message}")]
    Rpc { method: String, message: String },

    #[error("RPC transport failed: {0}")]
    Transport(String),

    #[error("Invalid RPC response for '{method}': {reason}")]
    InvalidResponse { method: String, reason: String },

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("No {role} account configured")]
    MissingAccount { role: &'static str },

    #[error("Please create a wallet and import the keys first!")]
    WalletNotCreated,

    #[error("No 'passphrase' found in configuration!")]
    MissingPassphrase,
}

/// Queue-related errors
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to connect to queue: {0}")]
    Connection(String),

    #[error("Failed to create stream: {0}")]
    StreamCreation(String),

    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    #[error("Failed to create consumer: {0}")]
    ConsumerCreation(String),

    #[error("Failed to publish message: {0}")]
    PublishFailed(String),

    #[error("Failed to consume message: {0}")]
    ConsumeFailed(String),

    #[error("Failed to acknowledge message: {0}")]
    AckFailed(String),

    #[error("Message serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Message deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Queue operation timeout: {0}")]
    Timeout(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_codes_round_trip() {
        for err in DomainError::ALL {
            assert_eq!(DomainError::from_code(err.code()), Some(err));
        }
        assert_eq!(DomainError::from_code("event_exploded"), None);
    }

    #[test]
    fn test_trigger_error_from_domain() {
        let err: TriggerError = DomainError::EventGroupClosed.into();
        assert!(matches!(
            err,
            TriggerError::Domain(DomainError::EventGroupClosed)
        ));
    }

    #[test]
    fn test_chain_error_messages() {
        assert_eq!(
            ChainError::MissingPassphrase.to_string(),
            "No 'passphrase' found in configuration!"
        );
        assert_eq!(
            ChainError::MissingAccount { role: "approver" }.to_string(),
            "No approver account configured"
        );
    }

    #[test]
    fn test_message_error_display() {
        assert_eq!(
            MessageError::InvalidAccount { field: "proposer" }.to_string(),
            "Message field 'proposer' must be a string account name"
        );
    }
}
