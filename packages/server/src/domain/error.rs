//! Domain-level error types.

use thiserror::Error;

/// Validation failure while constructing a value object.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueObjectError {
    #[error("user id must not be empty")]
    UserIdEmpty,

    #[error("user id exceeds {max} characters (got {actual})")]
    UserIdTooLong { max: usize, actual: usize },

    #[error("user id must not contain whitespace")]
    UserIdInvalidCharacter,

    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error("message body exceeds {max} characters (got {actual})")]
    MessageBodyTooLong { max: usize, actual: usize },

    #[error("attachment storage key is invalid: {0}")]
    InvalidStorageKey(String),

    #[error("attachment mime type '{0}' is invalid")]
    InvalidMimeType(String),

    #[error("client message id must be 1..={max} characters")]
    InvalidClientMessageId { max: usize },

    #[error("a conversation needs two distinct participants")]
    SameParticipant,
}

/// Failure reported by an external store (appointment or message store).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected the record: {0}")]
    Rejected(String),
}

/// Failure delivering an event to a live connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MessagePushError {
    #[error("connection '{0}' not found")]
    ConnectionNotFound(String),

    #[error("push failed: {0}")]
    PushFailed(String),

    #[error("failed to encode event: {0}")]
    Encode(String),
}

/// Failure reported by the external push-notification service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PushServiceError {
    #[error("push service unreachable: {0}")]
    Transport(String),

    #[error("push service rejected the notification with status {0}")]
    Rejected(u16),
}
