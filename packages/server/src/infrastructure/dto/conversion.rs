//! Conversion logic between DTOs and domain types.

use clinic_chat_shared::time::timestamp_to_rfc3339;

use crate::domain::{
    AccessDecision, AccessMode, AttachmentRef, HistoryPage, Message, OutboundEvent, UserId,
    ValueObjectError,
};
use crate::infrastructure::dto::{http, websocket as dto};

// ========================================
// DTO → Domain
// ========================================

impl dto::AttachmentRefDto {
    /// Normalize a client attachment reference to a bare storage key.
    pub fn into_domain(self, attachment_base_url: &str) -> Result<AttachmentRef, ValueObjectError> {
        AttachmentRef::from_client(&self.storage_key, self.mime_type, attachment_base_url)
    }
}

// ========================================
// Domain → DTO
// ========================================

impl From<&AccessDecision> for dto::AccessDto {
    fn from(decision: &AccessDecision) -> Self {
        let mode = match decision.mode {
            AccessMode::ReadWrite => "read_write",
            AccessMode::ReadOnly => "read_only",
        };
        Self {
            mode: mode.to_string(),
            reason: decision.reason.map(|reason| reason.as_str().to_string()),
            appointment_status: decision.appointment_status.as_str().to_string(),
        }
    }
}

/// Encodes domain values into wire DTOs.
///
/// Holds the attachment base URL because outgoing attachment references
/// carry a fetchable URL.
#[derive(Debug, Clone)]
pub struct EventEncoder {
    attachment_base_url: String,
}

impl EventEncoder {
    pub fn new(attachment_base_url: impl Into<String>) -> Self {
        Self {
            attachment_base_url: attachment_base_url.into(),
        }
    }

    pub fn attachment_base_url(&self) -> &str {
        &self.attachment_base_url
    }

    pub fn attachment_dto(&self, attachment: &AttachmentRef) -> dto::AttachmentDto {
        dto::AttachmentDto {
            storage_key: attachment.storage_key().to_string(),
            mime_type: attachment.mime_type().to_string(),
            url: attachment.url(&self.attachment_base_url),
            file_name: attachment.file_name().to_string(),
        }
    }

    pub fn message_dto(&self, message: &Message) -> dto::MessageDto {
        dto::MessageDto {
            id: message.id.to_string(),
            seq: message.seq.value(),
            room_key: message.room.as_str().to_string(),
            sender: message.sender.as_str().to_string(),
            receiver: message.receiver.as_str().to_string(),
            body: message.body.as_ref().map(|body| body.as_str().to_string()),
            attachment_ref: message
                .attachment
                .as_ref()
                .map(|attachment| self.attachment_dto(attachment)),
            client_msg_id: message
                .client_message_id
                .as_ref()
                .map(|id| id.as_str().to_string()),
            created_at: message.created_at.value(),
            sent_at: timestamp_to_rfc3339(message.created_at.value()),
        }
    }

    fn message_dtos(&self, messages: &[Message]) -> Vec<dto::MessageDto> {
        messages.iter().map(|m| self.message_dto(m)).collect()
    }

    /// Encode an event fanned out through the pusher.
    pub fn encode_event(&self, event: &OutboundEvent) -> Result<String, serde_json::Error> {
        match event {
            OutboundEvent::MessageReceived(message) => {
                serde_json::to_string(&dto::ReceiveMessageMessage {
                    r#type: dto::MessageType::ReceiveMessage,
                    message: self.message_dto(message),
                })
            }
            OutboundEvent::PresenceChanged { user_id, online } => {
                serde_json::to_string(&dto::PresenceChangedMessage {
                    r#type: dto::MessageType::PresenceChanged,
                    user_id: user_id.as_str().to_string(),
                    online: *online,
                })
            }
        }
    }

    pub fn online_users(&self, users: &[UserId]) -> dto::OnlineUsersMessage {
        dto::OnlineUsersMessage {
            r#type: dto::MessageType::OnlineUsers,
            user_ids: users.iter().map(|u| u.as_str().to_string()).collect(),
        }
    }

    pub fn previous_messages(
        &self,
        peer: &UserId,
        access: &AccessDecision,
        page: &HistoryPage,
    ) -> dto::PreviousMessagesMessage {
        dto::PreviousMessagesMessage {
            r#type: dto::MessageType::PreviousMessages,
            room_key: page.room.as_str().to_string(),
            peer_id: peer.as_str().to_string(),
            access: access.into(),
            messages: self.message_dtos(&page.messages),
            next_cursor: page.next_cursor.map(|seq| seq.value()),
        }
    }

    pub fn history_page(&self, page: &HistoryPage) -> dto::HistoryPageMessage {
        dto::HistoryPageMessage {
            r#type: dto::MessageType::HistoryPage,
            room_key: page.room.as_str().to_string(),
            messages: self.message_dtos(&page.messages),
            next_cursor: page.next_cursor.map(|seq| seq.value()),
        }
    }

    pub fn http_history_page(&self, access: &AccessDecision, page: &HistoryPage) -> http::HistoryPageDto {
        http::HistoryPageDto {
            room_key: page.room.as_str().to_string(),
            access: access.into(),
            messages: self.message_dtos(&page.messages),
            next_cursor: page.next_cursor.map(|seq| seq.value()),
        }
    }
}
