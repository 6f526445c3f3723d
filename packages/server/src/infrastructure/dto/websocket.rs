//! WebSocket event DTOs.
//!
//! Inbound frames are one tagged enum, [`ClientEvent`]; outbound frames are
//! flat structs carrying an explicit `type` field.

use serde::{Deserialize, Serialize};

/// Server → client event discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    OnlineUsers,
    PresenceChanged,
    PreviousMessages,
    ReceiveMessage,
    HistoryPage,
    Error,
}

/// Client → server events.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    Join {
        patient_id: String,
        doctor_id: String,
    },
    SendMessage {
        peer_id: String,
        body: Option<String>,
        attachment_ref: Option<AttachmentRefDto>,
        client_msg_id: Option<String>,
    },
    Leave {
        peer_id: String,
    },
    LoadHistory {
        peer_id: String,
        before: Option<u64>,
        limit: Option<usize>,
    },
}

/// Attachment reference as the client sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRefDto {
    /// Storage key, or a full URL under the configured attachment base.
    pub storage_key: String,
    pub mime_type: String,
}

/// Attachment reference as the server sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDto {
    pub storage_key: String,
    pub mime_type: String,
    pub url: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub seq: u64,
    pub room_key: String,
    pub sender: String,
    pub receiver: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_ref: Option<AttachmentDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_msg_id: Option<String>,
    /// Unix milliseconds, server-assigned
    pub created_at: i64,
    /// `created_at` as RFC 3339 (UTC)
    pub sent_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDto {
    /// "read_write" or "read_only"
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub appointment_status: String,
}

/// Sent once, right after the socket opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUsersMessage {
    pub r#type: MessageType,
    pub user_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceChangedMessage {
    pub r#type: MessageType,
    pub user_id: String,
    pub online: bool,
}

/// Reply to a successful `join`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousMessagesMessage {
    pub r#type: MessageType,
    pub room_key: String,
    pub peer_id: String,
    pub access: AccessDto,
    pub messages: Vec<MessageDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<u64>,
}

/// Reply to `load-history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPageMessage {
    pub r#type: MessageType,
    pub room_key: String,
    pub messages: Vec<MessageDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveMessageMessage {
    pub r#type: MessageType,
    #[serde(flatten)]
    pub message: MessageDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    pub r#type: MessageType,
    pub code: String,
    pub reason: String,
    pub retryable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_join_event() {
        // テスト項目: join イベントが camelCase のフィールドで解釈される
        // given (前提条件):
        let json = r#"{"type":"join","patientId":"p-1","doctorId":"d-1"}"#;

        // when (操作):
        let event: ClientEvent = serde_json::from_str(json).unwrap();

        // then (期待する結果):
        assert_eq!(
            event,
            ClientEvent::Join {
                patient_id: "p-1".to_string(),
                doctor_id: "d-1".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_send_message_with_optional_fields() {
        // テスト項目: send-message の省略可能フィールドは省略しても解釈できる
        // given (前提条件):
        let minimal = r#"{"type":"send-message","peerId":"d-1","body":"Hi"}"#;
        let full = r#"{"type":"send-message","peerId":"d-1","attachmentRef":{"storageKey":"k/a.png","mimeType":"image/png"},"clientMsgId":"c-1"}"#;

        // when (操作):
        let minimal: ClientEvent = serde_json::from_str(minimal).unwrap();
        let full: ClientEvent = serde_json::from_str(full).unwrap();

        // then (期待する結果):
        assert_eq!(
            minimal,
            ClientEvent::SendMessage {
                peer_id: "d-1".to_string(),
                body: Some("Hi".to_string()),
                attachment_ref: None,
                client_msg_id: None,
            }
        );
        assert!(matches!(
            full,
            ClientEvent::SendMessage {
                body: None,
                attachment_ref: Some(_),
                client_msg_id: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        // テスト項目: 未知のイベント種別はパースエラーになる
        // given (前提条件):
        let json = r#"{"type":"edit-message","id":"x"}"#;

        // when (操作):
        let result = serde_json::from_str::<ClientEvent>(json);

        // then (期待する結果):
        assert!(result.is_err());
    }

    #[test]
    fn test_receive_message_is_flattened() {
        // テスト項目: receive-message はメッセージのフィールドがトップレベルに展開される
        // given (前提条件):
        let msg = ReceiveMessageMessage {
            r#type: MessageType::ReceiveMessage,
            message: MessageDto {
                id: "m-1".to_string(),
                seq: 3,
                room_key: "d-1:p-1".to_string(),
                sender: "p-1".to_string(),
                receiver: "d-1".to_string(),
                body: Some("Hello".to_string()),
                attachment_ref: None,
                client_msg_id: None,
                created_at: 1000,
                sent_at: "1970-01-01T00:00:01.000Z".to_string(),
            },
        };

        // when (操作):
        let value = serde_json::to_value(&msg).unwrap();

        // then (期待する結果):
        assert_eq!(value["type"], "receive-message");
        assert_eq!(value["sender"], "p-1");
        assert_eq!(value["createdAt"], 1000);
        assert!(value.get("attachmentRef").is_none());
    }
}
