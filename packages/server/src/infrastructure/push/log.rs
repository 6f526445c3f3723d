//! Push service that only logs.

use async_trait::async_trait;

use crate::domain::{PushNotification, PushService, PushServiceError};

#[derive(Debug, Default, Clone, Copy)]
pub struct LogPushService;

#[async_trait]
impl PushService for LogPushService {
    async fn send_push(&self, notification: &PushNotification) -> Result<(), PushServiceError> {
        tracing::info!(
            user_id = %notification.user_id,
            title = %notification.title,
            "Push notification (log only), {} chars",
            notification.body.chars().count()
        );
        Ok(())
    }
}
