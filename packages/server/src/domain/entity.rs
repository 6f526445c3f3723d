//! Entities and domain events.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use super::{
    error::ValueObjectError,
    value_object::{
        AttachmentRef, ClientMessageId, MessageBody, MessageId, RoomKey, Sequence, Timestamp,
        UserId,
    },
};

/// Appointment status as reported by the appointment store.
///
/// The store's vocabulary is not owned here, so anything unrecognised is kept
/// verbatim in [`AppointmentStatus::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    Pending,
    Active,
    Scheduled,
    Completed,
    Cancelled,
    /// The appointment exists but carries no status.
    Unset,
    Unknown(String),
}

impl AppointmentStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return Self::Unset;
        };
        match raw.to_ascii_lowercase().as_str() {
            "" => Self::Unset,
            "pending" => Self::Pending,
            "active" => Self::Active,
            "scheduled" => Self::Scheduled,
            "completed" => Self::Completed,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Unset => "unset",
            Self::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest appointment between a patient and a doctor, as the store returns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentRecord {
    pub status: Option<String>,
    pub updated_at: Timestamp,
}

impl AppointmentRecord {
    pub fn new(status: Option<String>, updated_at: Timestamp) -> Self {
        Self { status, updated_at }
    }

    pub fn status(&self) -> AppointmentStatus {
        AppointmentStatus::parse(self.status.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    ReadWrite,
    ReadOnly,
}

/// Why a conversation is read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    Pending,
    Completed,
    Cancelled,
    UnknownStatus,
    NotParticipant,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::UnknownStatus => "unknown_status",
            Self::NotParticipant => "not_participant",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access decision for a conversation, derived from its controlling appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub mode: AccessMode,
    pub reason: Option<DenyReason>,
    pub appointment_status: AppointmentStatus,
}

impl AccessDecision {
    /// Maps a status to a mode. Unrecognised statuses fail closed.
    pub fn from_status(status: AppointmentStatus) -> Self {
        let reason = match &status {
            AppointmentStatus::Active | AppointmentStatus::Scheduled | AppointmentStatus::Unset => {
                None
            }
            AppointmentStatus::Pending => Some(DenyReason::Pending),
            AppointmentStatus::Completed => Some(DenyReason::Completed),
            AppointmentStatus::Cancelled => Some(DenyReason::Cancelled),
            AppointmentStatus::Unknown(_) => Some(DenyReason::UnknownStatus),
        };
        let mode = if reason.is_none() {
            AccessMode::ReadWrite
        } else {
            AccessMode::ReadOnly
        };
        Self {
            mode,
            reason,
            appointment_status: status,
        }
    }

    pub fn can_send(&self) -> bool {
        self.mode == AccessMode::ReadWrite
    }
}

/// The channel between exactly one patient and one doctor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub patient: UserId,
    pub doctor: UserId,
    pub room: RoomKey,
}

impl Conversation {
    pub fn new(patient: UserId, doctor: UserId) -> Result<Self, ValueObjectError> {
        if patient == doctor {
            return Err(ValueObjectError::SameParticipant);
        }
        let room = RoomKey::for_pair(&patient, &doctor);
        Ok(Self {
            patient,
            doctor,
            room,
        })
    }

    /// The other participant, or `None` if `user` is not part of this conversation.
    pub fn peer_of(&self, user: &UserId) -> Option<&UserId> {
        if &self.patient == user {
            Some(&self.doctor)
        } else if &self.doctor == user {
            Some(&self.patient)
        } else {
            None
        }
    }
}

/// A message that passed validation but has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub room: RoomKey,
    pub sender: UserId,
    pub receiver: UserId,
    pub body: Option<MessageBody>,
    pub attachment: Option<AttachmentRef>,
    pub client_message_id: Option<ClientMessageId>,
}

/// A persisted, immutable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub seq: Sequence,
    pub room: RoomKey,
    pub sender: UserId,
    pub receiver: UserId,
    pub body: Option<MessageBody>,
    pub attachment: Option<AttachmentRef>,
    pub client_message_id: Option<ClientMessageId>,
    pub created_at: Timestamp,
}

/// One page of a conversation's history, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage {
    pub room: RoomKey,
    pub messages: Vec<Message>,
    /// Pass as `before` to fetch the next older page; `None` once exhausted.
    pub next_cursor: Option<Sequence>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Document,
}

impl From<&AttachmentRef> for AttachmentKind {
    fn from(attachment: &AttachmentRef) -> Self {
        if attachment.is_image() {
            Self::Image
        } else {
            Self::Document
        }
    }
}

/// Payload handed to the external push service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotification {
    pub user_id: UserId,
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

/// Events fanned out to live connections through a `MessagePusher`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    MessageReceived(Message),
    PresenceChanged { user_id: UserId, online: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    #[test]
    fn test_status_parsing() {
        // テスト項目: ステータス文字列が正しく解釈され、未知の値は保持される
        // given (前提条件) / when (操作) / then (期待する結果):
        assert_eq!(AppointmentStatus::parse(Some("Pending")), AppointmentStatus::Pending);
        assert_eq!(AppointmentStatus::parse(Some("canceled")), AppointmentStatus::Cancelled);
        assert_eq!(AppointmentStatus::parse(None), AppointmentStatus::Unset);
        assert_eq!(AppointmentStatus::parse(Some("  ")), AppointmentStatus::Unset);
        assert_eq!(
            AppointmentStatus::parse(Some("no_show")),
            AppointmentStatus::Unknown("no_show".to_string())
        );
    }

    #[test]
    fn test_access_decision_table() {
        // テスト項目: ステータスごとに読み書き可否と理由が決まる
        // given (前提条件):
        let cases = [
            (AppointmentStatus::Active, AccessMode::ReadWrite, None),
            (AppointmentStatus::Scheduled, AccessMode::ReadWrite, None),
            (AppointmentStatus::Unset, AccessMode::ReadWrite, None),
            (AppointmentStatus::Pending, AccessMode::ReadOnly, Some(DenyReason::Pending)),
            (AppointmentStatus::Completed, AccessMode::ReadOnly, Some(DenyReason::Completed)),
            (AppointmentStatus::Cancelled, AccessMode::ReadOnly, Some(DenyReason::Cancelled)),
            (
                AppointmentStatus::Unknown("rescheduled".to_string()),
                AccessMode::ReadOnly,
                Some(DenyReason::UnknownStatus),
            ),
        ];

        for (status, mode, reason) in cases {
            // when (操作):
            let decision = AccessDecision::from_status(status.clone());

            // then (期待する結果):
            assert_eq!(decision.mode, mode, "status {status}");
            assert_eq!(decision.reason, reason, "status {status}");
            assert_eq!(decision.appointment_status, status);
        }
    }

    #[test]
    fn test_conversation_requires_distinct_participants() {
        // テスト項目: 同一ユーザー同士の会話は作れない
        // given (前提条件):
        let same = user("u-1");

        // when (操作):
        let result = Conversation::new(same.clone(), same);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::SameParticipant));
    }

    #[test]
    fn test_conversation_peer_of() {
        // テスト項目: 参加者から相手を引ける。非参加者は None
        // given (前提条件):
        let conversation = Conversation::new(user("p-1"), user("d-1")).unwrap();

        // when (操作) / then (期待する結果):
        assert_eq!(conversation.peer_of(&user("p-1")), Some(&user("d-1")));
        assert_eq!(conversation.peer_of(&user("d-1")), Some(&user("p-1")));
        assert_eq!(conversation.peer_of(&user("x-1")), None);
    }
}
