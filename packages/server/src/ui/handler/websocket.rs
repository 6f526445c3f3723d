//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{
    domain::{ClientMessageId, MessageBody, PusherChannel, Role, Sequence, UserId, ValueObjectError},
    infrastructure::dto::websocket::{ClientEvent, ErrorMessage, MessageType},
    ui::state::AppState,
    usecase::{ChatError, ChatSession},
};

/// Query parameters for WebSocket connection
///
/// The transport in front of this server is trusted to have authenticated them.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub user_id: String,
    pub role: String,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let user = match UserId::try_from(query.user_id.as_str()) {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Rejected connection with invalid user_id '{}': {}", query.user_id, e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };
    let role = match Role::try_from(query.role.as_str()) {
        Ok(role) => role,
        Err(e) => {
            tracing::warn!("Rejected connection of '{}' with role '{}': {}", user, query.role, e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user, role)))
}

/// Spawns a task that forwards frames from the connection's channel to the socket.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user: UserId, role: Role) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();

    let (mut session, online_users) = state.sessions.open(user, role, tx.clone()).await;

    // online-users goes out before anything the pusher queued meanwhile.
    if let Some(frame) = encode(&state.encoder.online_users(&online_users))
        && let Err(e) = sender.send(Message::Text(frame.into())).await
    {
        tracing::error!("Failed to send online users to '{}': {}", session.user(), e);
        session.close().await;
        return;
    }

    let mut send_task = pusher_loop(rx, sender);

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_text(&state, &mut session, &tx, text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("'{}' closed the connection", session.user());
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!("WebSocket error for '{}': {}", session.user(), e);
                    break;
                }
            },
            _ = &mut send_task => break,
        }
    }

    send_task.abort();
    session.close().await;
}

async fn handle_text(state: &AppState, session: &mut ChatSession, tx: &PusherChannel, text: &str) {
    let reply = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => dispatch(state, session, event).await,
        Err(e) => Err(ChatError::InvalidRequest(format!("malformed event: {}", e))),
    };

    let frame = match reply {
        Ok(Some(frame)) => frame,
        Ok(None) => return,
        Err(error) => {
            tracing::warn!(
                "Request from '{}' failed: {} ({})",
                session.user(),
                error.code(),
                error
            );
            match encode(&error_message(&error)) {
                Some(frame) => frame,
                None => return,
            }
        }
    };
    if tx.send(frame).is_err() {
        tracing::debug!("Connection of '{}' is already closing", session.user());
    }
}

/// Apply one client event. Returns the reply frame for this connection, if any.
async fn dispatch(
    state: &AppState,
    session: &mut ChatSession,
    event: ClientEvent,
) -> Result<Option<String>, ChatError> {
    match event {
        ClientEvent::Join {
            patient_id,
            doctor_id,
        } => {
            let outcome = session
                .join(parse_user(&patient_id)?, parse_user(&doctor_id)?)
                .await?;
            Ok(encode(&state.encoder.previous_messages(
                &outcome.peer,
                &outcome.access,
                &outcome.history,
            )))
        }
        ClientEvent::SendMessage {
            peer_id,
            body,
            attachment_ref,
            client_msg_id,
        } => {
            let peer = parse_user(&peer_id)?;
            let body = match body {
                Some(body) => MessageBody::parse(&body).map_err(invalid)?,
                None => None,
            };
            let attachment = attachment_ref
                .map(|dto| dto.into_domain(state.encoder.attachment_base_url()))
                .transpose()
                .map_err(invalid)?;
            let client_message_id = client_msg_id
                .map(ClientMessageId::new)
                .transpose()
                .map_err(invalid)?;

            let message = session
                .send(&peer, body, attachment, client_message_id)
                .await?;
            tracing::debug!("'{}' sent message {}", session.user(), message.id);
            // The room broadcast already reached this connection.
            Ok(None)
        }
        ClientEvent::Leave { peer_id } => {
            let peer = parse_user(&peer_id)?;
            session.leave(Some(&peer)).await;
            Ok(None)
        }
        ClientEvent::LoadHistory {
            peer_id,
            before,
            limit,
        } => {
            let peer = parse_user(&peer_id)?;
            let page = session
                .load_history(&peer, before.map(Sequence::new), limit)
                .await?;
            Ok(encode(&state.encoder.history_page(&page)))
        }
    }
}

fn invalid(error: ValueObjectError) -> ChatError {
    ChatError::InvalidRequest(error.to_string())
}

fn parse_user(raw: &str) -> Result<UserId, ChatError> {
    UserId::try_from(raw).map_err(invalid)
}

fn error_message(error: &ChatError) -> ErrorMessage {
    ErrorMessage {
        r#type: MessageType::Error,
        code: error.code().to_string(),
        reason: error.reason(),
        retryable: error.is_retryable(),
    }
}

fn encode<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!("Failed to encode outbound frame: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DenyReason;

    #[test]
    fn test_error_message_for_access_denied() {
        // テスト項目: AccessDenied は理由付き・再試行不可のエラーフレームになる
        // given (前提条件):
        let error = ChatError::AccessDenied {
            reason: DenyReason::Completed,
        };

        // when (操作):
        let json = encode(&error_message(&error)).unwrap();

        // then (期待する結果):
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["code"], "AccessDenied");
        assert_eq!(value["reason"], "completed");
        assert_eq!(value["retryable"], false);
    }

    #[test]
    fn test_error_message_for_timeout_is_retryable() {
        // テスト項目: Timeout は再試行可能として通知され、reason も付く
        // given (前提条件) / when (操作):
        let json = encode(&error_message(&ChatError::Timeout)).unwrap();

        // then (期待する結果):
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["code"], "Timeout");
        assert_eq!(value["retryable"], true);
        assert_eq!(value["reason"], "operation timed out");
    }

    #[test]
    fn test_parse_user_rejects_invalid_id() {
        // テスト項目: 不正なユーザー ID は InvalidRequest になる
        // given (前提条件) / when (操作) / then (期待する結果):
        assert!(matches!(parse_user("a b"), Err(ChatError::InvalidRequest(_))));
        assert!(parse_user("p-1").is_ok());
    }
}
