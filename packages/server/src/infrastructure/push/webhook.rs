//! Push service backed by an HTTP webhook.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{PushNotification, PushService, PushServiceError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// POSTs `{userId, title, body, data}` to the configured URL.
pub struct WebhookPushService {
    client: reqwest::Client,
    url: String,
}

impl WebhookPushService {
    pub fn new(url: impl Into<String>) -> Result<Self, PushServiceError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PushServiceError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl PushService for WebhookPushService {
    async fn send_push(&self, notification: &PushNotification) -> Result<(), PushServiceError> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| PushServiceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushServiceError::Rejected(status.as_u16()));
        }
        tracing::debug!("Push for '{}' accepted by webhook", notification.user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use axum::{Json, Router, http::StatusCode, routing::post};
    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::UserId;

    fn notification() -> PushNotification {
        PushNotification {
            user_id: UserId::new("d-1".to_string()).unwrap(),
            title: "New message".to_string(),
            body: "Hello".to_string(),
            data: BTreeMap::from([("roomKey".to_string(), "d-1:p-1".to_string())]),
        }
    }

    async fn spawn_webhook(status: StatusCode) -> (String, mpsc::UnboundedReceiver<serde_json::Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new().route(
            "/push",
            post(move |Json(body): Json<serde_json::Value>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(body);
                    status
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/push", addr), rx)
    }

    #[tokio::test]
    async fn test_webhook_receives_camel_case_payload() {
        // テスト項目: Webhook に camelCase の JSON が POST される
        // given (前提条件):
        let (url, mut rx) = spawn_webhook(StatusCode::OK).await;
        let service = WebhookPushService::new(url).unwrap();

        // when (操作):
        let result = service.send_push(&notification()).await;

        // then (期待する結果):
        assert!(result.is_ok());
        let body = rx.recv().await.unwrap();
        assert_eq!(body["userId"], "d-1");
        assert_eq!(body["title"], "New message");
        assert_eq!(body["data"]["roomKey"], "d-1:p-1");
    }

    #[tokio::test]
    async fn test_webhook_non_success_is_rejected() {
        // テスト項目: 2xx 以外のレスポンスは Rejected エラーになる
        // given (前提条件):
        let (url, _rx) = spawn_webhook(StatusCode::BAD_GATEWAY).await;
        let service = WebhookPushService::new(url).unwrap();

        // when (操作):
        let result = service.send_push(&notification()).await;

        // then (期待する結果):
        assert_eq!(result, Err(PushServiceError::Rejected(502)));
    }
}
