//! WebSocket を使った MessagePusher 実装
//!
//! ## 責務
//!
//! - 接続ごとの `UnboundedSender` を管理
//! - ルーム → 購読接続のインデックスを管理
//! - イベントを JSON にエンコードして配信（push_to, publish_to_room, broadcast）
//!
//! ## 設計ノート
//!
//! WebSocket の生成は UI 層（`ui/handler/websocket.rs`）で行われます。
//! この実装は生成された sender を受け取り、配信にのみ使用します。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{
        ConnectionId, MessagePushError, MessagePusher, OutboundEvent, PusherChannel, RoomKey,
        UserId,
    },
    infrastructure::dto::conversion::EventEncoder,
};

struct ConnectionEntry {
    user: UserId,
    channel: PusherChannel,
    room: Option<RoomKey>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    rooms: HashMap<RoomKey, HashSet<ConnectionId>>,
}

impl Registry {
    fn detach_from_room(&mut self, connection: &ConnectionId, room: &RoomKey) {
        if let Some(subscribers) = self.rooms.get_mut(room) {
            subscribers.remove(connection);
            if subscribers.is_empty() {
                self.rooms.remove(room);
            }
        }
    }
}

/// WebSocket を使った MessagePusher 実装
///
/// The connection table and the room index sit behind one lock, so a
/// subscription change and a room publish never observe each other halfway.
pub struct WebSocketMessagePusher {
    registry: Mutex<Registry>,
    encoder: EventEncoder,
}

impl WebSocketMessagePusher {
    pub fn new(encoder: EventEncoder) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            encoder,
        }
    }

    fn encode(&self, event: &OutboundEvent) -> Result<String, MessagePushError> {
        self.encoder
            .encode_event(event)
            .map_err(|e| MessagePushError::Encode(e.to_string()))
    }

    /// Connections currently subscribed to `room`.
    pub async fn subscriber_count(&self, room: &RoomKey) -> usize {
        let registry = self.registry.lock().await;
        registry.rooms.get(room).map_or(0, HashSet::len)
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_connection(
        &self,
        connection: ConnectionId,
        user: UserId,
        channel: PusherChannel,
    ) {
        let mut registry = self.registry.lock().await;
        tracing::debug!("Connection {} of '{}' registered to MessagePusher", connection, user);
        registry.connections.insert(
            connection,
            ConnectionEntry {
                user,
                channel,
                room: None,
            },
        );
    }

    async fn unregister_connection(&self, connection: &ConnectionId) {
        let mut registry = self.registry.lock().await;
        if let Some(entry) = registry.connections.remove(connection) {
            if let Some(room) = entry.room {
                registry.detach_from_room(connection, &room);
            }
            tracing::debug!(
                "Connection {} of '{}' unregistered from MessagePusher",
                connection,
                entry.user
            );
        }
    }

    async fn subscribe(&self, connection: &ConnectionId, room: RoomKey) -> Option<RoomKey> {
        let mut registry = self.registry.lock().await;
        let previous = {
            let entry = registry.connections.get_mut(connection)?;
            entry.room.replace(room.clone())
        };
        if let Some(previous) = &previous {
            registry.detach_from_room(connection, previous);
        }
        registry.rooms.entry(room).or_default().insert(*connection);
        previous
    }

    async fn unsubscribe(&self, connection: &ConnectionId) -> Option<RoomKey> {
        let mut registry = self.registry.lock().await;
        let previous = registry.connections.get_mut(connection)?.room.take();
        if let Some(room) = &previous {
            registry.detach_from_room(connection, room);
        }
        previous
    }

    async fn push_to(
        &self,
        connection: &ConnectionId,
        event: &OutboundEvent,
    ) -> Result<(), MessagePushError> {
        let content = self.encode(event)?;
        let registry = self.registry.lock().await;
        let entry = registry
            .connections
            .get(connection)
            .ok_or_else(|| MessagePushError::ConnectionNotFound(connection.to_string()))?;
        entry
            .channel
            .send(content)
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))
    }

    async fn publish_to_room(
        &self,
        room: &RoomKey,
        event: &OutboundEvent,
    ) -> Result<usize, MessagePushError> {
        let content = self.encode(event)?;
        let registry = self.registry.lock().await;
        let Some(subscribers) = registry.rooms.get(room) else {
            return Ok(0);
        };

        let mut delivered = 0;
        for connection in subscribers {
            let Some(entry) = registry.connections.get(connection) else {
                continue;
            };
            // 部分的な送信失敗は許容する（切断処理が後で掃除する）
            if let Err(e) = entry.channel.send(content.clone()) {
                tracing::warn!("Failed to push to connection {} of '{}': {}", connection, entry.user, e);
            } else {
                delivered += 1;
            }
        }
        tracing::debug!("Published to {} connection(s) in room {}", delivered, room);
        Ok(delivered)
    }

    async fn broadcast(
        &self,
        event: &OutboundEvent,
        exclude: Option<&ConnectionId>,
    ) -> Result<usize, MessagePushError> {
        let content = self.encode(event)?;
        let registry = self.registry.lock().await;

        let mut delivered = 0;
        for (connection, entry) in registry.connections.iter() {
            if Some(connection) == exclude {
                continue;
            }
            if let Err(e) = entry.channel.send(content.clone()) {
                tracing::warn!("Failed to broadcast to connection {} of '{}': {}", connection, entry.user, e);
            } else {
                delivered += 1;
            }
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - ルームの購読・購読解除と、ルーム単位の配信
    // - 全体ブロードキャスト（除外指定あり）
    // - 接続解除時に購読も消えること
    // ========================================

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn create_test_pusher() -> WebSocketMessagePusher {
        WebSocketMessagePusher::new(EventEncoder::new("http://files.local"))
    }

    fn presence_event(id: &str) -> OutboundEvent {
        OutboundEvent::PresenceChanged {
            user_id: user(id),
            online: true,
        }
    }

    async fn connect(
        pusher: &WebSocketMessagePusher,
        id: &str,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = ConnectionId::generate();
        pusher.register_connection(connection, user(id), tx).await;
        (connection, rx)
    }

    #[tokio::test]
    async fn test_publish_reaches_only_room_subscribers() {
        // テスト項目: ルームに購読している接続にだけ配信される
        // given (前提条件):
        let pusher = create_test_pusher();
        let room = RoomKey::for_pair(&user("p-1"), &user("d-1"));
        let (patient, mut patient_rx) = connect(&pusher, "p-1").await;
        let (doctor, mut doctor_rx) = connect(&pusher, "d-1").await;
        let (_other, mut other_rx) = connect(&pusher, "p-2").await;
        pusher.subscribe(&patient, room.clone()).await;
        pusher.subscribe(&doctor, room.clone()).await;

        // when (操作):
        let delivered = pusher
            .publish_to_room(&room, &presence_event("x"))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(delivered, 2);
        assert!(patient_rx.try_recv().is_ok());
        assert!(doctor_rx.try_recv().is_ok());
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscribe_moves_between_rooms() {
        // テスト項目: 別ルームを購読すると前のルームから自動的に外れる
        // given (前提条件):
        let pusher = create_test_pusher();
        let first = RoomKey::for_pair(&user("p-1"), &user("d-1"));
        let second = RoomKey::for_pair(&user("p-1"), &user("d-2"));
        let (connection, _rx) = connect(&pusher, "p-1").await;
        pusher.subscribe(&connection, first.clone()).await;

        // when (操作):
        let previous = pusher.subscribe(&connection, second.clone()).await;

        // then (期待する結果):
        assert_eq!(previous, Some(first.clone()));
        assert_eq!(pusher.subscriber_count(&first).await, 0);
        assert_eq!(pusher.subscriber_count(&second).await, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        // テスト項目: 購読解除は何度呼んでも問題ない
        // given (前提条件):
        let pusher = create_test_pusher();
        let room = RoomKey::for_pair(&user("p-1"), &user("d-1"));
        let (connection, _rx) = connect(&pusher, "p-1").await;
        pusher.subscribe(&connection, room.clone()).await;

        // when (操作):
        let first = pusher.unsubscribe(&connection).await;
        let second = pusher.unsubscribe(&connection).await;

        // then (期待する結果):
        assert_eq!(first, Some(room.clone()));
        assert_eq!(second, None);
        assert_eq!(pusher.subscriber_count(&room).await, 0);
    }

    #[tokio::test]
    async fn test_unregister_drops_subscription() {
        // テスト項目: 接続解除でルームの購読も削除される
        // given (前提条件):
        let pusher = create_test_pusher();
        let room = RoomKey::for_pair(&user("p-1"), &user("d-1"));
        let (connection, _rx) = connect(&pusher, "p-1").await;
        pusher.subscribe(&connection, room.clone()).await;

        // when (操作):
        pusher.unregister_connection(&connection).await;

        // then (期待する結果):
        assert_eq!(pusher.subscriber_count(&room).await, 0);
        assert!(matches!(
            pusher.push_to(&connection, &presence_event("x")).await,
            Err(MessagePushError::ConnectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_broadcast_excludes_given_connection() {
        // テスト項目: ブロードキャストは除外指定した接続以外の全接続に届く
        // given (前提条件):
        let pusher = create_test_pusher();
        let (alice, mut alice_rx) = connect(&pusher, "alice").await;
        let (_bob, mut bob_rx) = connect(&pusher, "bob").await;

        // when (操作):
        let delivered = pusher
            .broadcast(&presence_event("alice"), Some(&alice))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(delivered, 1);
        assert!(alice_rx.try_recv().is_err());
        let frame = bob_rx.try_recv().unwrap();
        assert!(frame.contains("presence-changed"));
    }

    #[tokio::test]
    async fn test_publish_tolerates_closed_channel() {
        // テスト項目: 受信側が閉じた接続があっても配信全体は成功する
        // given (前提条件):
        let pusher = create_test_pusher();
        let room = RoomKey::for_pair(&user("p-1"), &user("d-1"));
        let (closed, closed_rx) = connect(&pusher, "p-1").await;
        let (open, mut open_rx) = connect(&pusher, "d-1").await;
        pusher.subscribe(&closed, room.clone()).await;
        pusher.subscribe(&open, room.clone()).await;
        drop(closed_rx);

        // when (操作):
        let delivered = pusher
            .publish_to_room(&room, &presence_event("x"))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(delivered, 1);
        assert!(open_rx.try_recv().is_ok());
    }
}
