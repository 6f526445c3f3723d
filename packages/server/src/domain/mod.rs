//! Domain layer: value objects, entities and the interfaces of the
//! collaborators this subsystem depends on.
//!
//! Nothing here performs I/O. Concrete stores, pushers and push services live
//! in `infrastructure`.

pub mod entity;
pub mod error;
pub mod presence;
pub mod pusher;
pub mod repository;
pub mod value_object;

pub use entity::{
    AccessDecision, AccessMode, AppointmentRecord, AppointmentStatus, AttachmentKind,
    Conversation, DenyReason, HistoryPage, Message, NewMessage, OutboundEvent, PushNotification,
};
pub use error::{MessagePushError, PushServiceError, RepositoryError, ValueObjectError};
pub use presence::{PresenceRegistry, PresenceTransition};
pub use pusher::{MessagePusher, PusherChannel};
pub use repository::{AppointmentStore, MessageStore, PushService};
pub use value_object::{
    AttachmentRef, ClientMessageId, ConnectionId, MessageBody, MessageId, Role, RoomKey,
    Sequence, Timestamp, UserId,
};
