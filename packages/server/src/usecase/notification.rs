//! UseCase: オフライン受信者へのプッシュ通知
//!
//! Best effort. Runs detached from the send path; failures are logged and
//! never reach the sender.

use std::{collections::BTreeMap, sync::Arc};

use tokio::task::JoinHandle;

use crate::domain::{AttachmentKind, Message, PresenceRegistry, PushNotification, PushService};

/// Longest text preview, in characters, before it is cut with an ellipsis.
const PREVIEW_MAX_CHARS: usize = 100;

pub struct NotificationDispatcher {
    presence: Arc<dyn PresenceRegistry>,
    push: Arc<dyn PushService>,
}

impl NotificationDispatcher {
    pub fn new(presence: Arc<dyn PresenceRegistry>, push: Arc<dyn PushService>) -> Self {
        Self { presence, push }
    }

    /// Alert the receiver of `message` if they hold no connection right now.
    ///
    /// Returns the handle of the spawned delivery task, or `None` when the
    /// receiver is online and nothing was sent.
    pub fn notify(&self, message: &Message) -> Option<JoinHandle<()>> {
        if self.presence.is_online(&message.receiver) {
            return None;
        }

        let notification = build_notification(message);
        let push = self.push.clone();
        Some(tokio::spawn(async move {
            match push.send_push(&notification).await {
                Ok(()) => tracing::debug!("Push notification sent to {}", notification.user_id),
                Err(e) => tracing::warn!(
                    "Failed to send push notification to {}: {}",
                    notification.user_id,
                    e
                ),
            }
        }))
    }
}

pub(crate) fn build_notification(message: &Message) -> PushNotification {
    let body = match (&message.body, &message.attachment) {
        (Some(body), _) => preview(body.as_str()),
        (None, Some(attachment)) => match AttachmentKind::from(attachment) {
            AttachmentKind::Image => "sent an image".to_string(),
            AttachmentKind::Document => "sent a document".to_string(),
        },
        (None, None) => String::new(),
    };

    let mut data = BTreeMap::new();
    data.insert("roomKey".to_string(), message.room.as_str().to_string());
    data.insert("messageId".to_string(), message.id.to_string());
    data.insert("senderId".to_string(), message.sender.as_str().to_string());

    PushNotification {
        user_id: message.receiver.clone(),
        title: format!("New message from {}", message.sender),
        body,
        data,
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_MAX_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(PREVIEW_MAX_CHARS).collect();
    cut.push('…');
    cut
}
