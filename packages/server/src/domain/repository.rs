//! Interfaces of the external collaborators.
//!
//! The core depends only on these traits. Implementations live in the
//! infrastructure layer (dependency inversion), and tests substitute mocks.

use async_trait::async_trait;

use super::{
    entity::{AppointmentRecord, Message, NewMessage, PushNotification},
    error::{PushServiceError, RepositoryError},
    value_object::{ClientMessageId, MessageId, RoomKey, Sequence, Timestamp, UserId},
};

/// Read access to the relational appointment store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Most recent appointment between the pair, or `None` if they never had one.
    async fn get_latest_appointment(
        &self,
        patient: &UserId,
        doctor: &UserId,
    ) -> Result<Option<AppointmentRecord>, RepositoryError>;
}

/// Durable message history.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message. The store assigns the insertion sequence.
    async fn insert_message(
        &self,
        id: MessageId,
        created_at: Timestamp,
        message: NewMessage,
    ) -> Result<Message, RepositoryError>;

    /// Up to `limit` messages of `room` with a sequence below `before`
    /// (all messages when `None`), oldest first.
    async fn query_messages(
        &self,
        room: &RoomKey,
        before: Option<Sequence>,
        limit: usize,
    ) -> Result<Vec<Message>, RepositoryError>;

    /// Message previously stored with the given idempotency token.
    async fn find_by_client_message_id(
        &self,
        room: &RoomKey,
        sender: &UserId,
        client_message_id: &ClientMessageId,
    ) -> Result<Option<Message>, RepositoryError>;
}

/// Out-of-band notification dispatcher (mobile push, e-mail, ...).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushService: Send + Sync {
    async fn send_push(&self, notification: &PushNotification) -> Result<(), PushServiceError>;
}
