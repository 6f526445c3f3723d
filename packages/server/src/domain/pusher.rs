//! Live delivery interface.
//!
//! `MessagePusher` owns the connection table and the room → subscribers
//! index. It is the seam for running several server processes: a message bus
//! backed implementation fans events out across instances without any change
//! to the use cases.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{
    entity::OutboundEvent,
    error::MessagePushError,
    value_object::{ConnectionId, RoomKey, UserId},
};

/// Outbound channel of one connection. Frames are already encoded.
pub type PusherChannel = mpsc::UnboundedSender<String>;

#[async_trait]
pub trait MessagePusher: Send + Sync {
    async fn register_connection(
        &self,
        connection: ConnectionId,
        user: UserId,
        channel: PusherChannel,
    );

    /// Also drops the connection's room subscription.
    async fn unregister_connection(&self, connection: &ConnectionId);

    /// Subscribe to `room`, leaving any previous room in the same step.
    /// Returns the previous room.
    async fn subscribe(&self, connection: &ConnectionId, room: RoomKey) -> Option<RoomKey>;

    /// Returns the room that was left, if any.
    async fn unsubscribe(&self, connection: &ConnectionId) -> Option<RoomKey>;

    async fn push_to(
        &self,
        connection: &ConnectionId,
        event: &OutboundEvent,
    ) -> Result<(), MessagePushError>;

    /// Deliver to every connection subscribed to `room`.
    /// Returns the number of connections reached.
    async fn publish_to_room(
        &self,
        room: &RoomKey,
        event: &OutboundEvent,
    ) -> Result<usize, MessagePushError>;

    /// Deliver to every registered connection except `exclude`.
    async fn broadcast(
        &self,
        event: &OutboundEvent,
        exclude: Option<&ConnectionId>,
    ) -> Result<usize, MessagePushError>;
}
