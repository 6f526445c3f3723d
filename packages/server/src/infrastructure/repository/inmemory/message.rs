//! In-memory message store.
//!
//! Messages are kept per room in insertion order. The sequence is a single
//! process-wide counter, playing the role of a database auto-increment.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{
    ClientMessageId, Message, MessageId, MessageStore, NewMessage, RepositoryError, RoomKey,
    Sequence, Timestamp, UserId,
};

#[derive(Default)]
struct Inner {
    rooms: HashMap<RoomKey, Vec<Message>>,
    last_seq: u64,
}

#[derive(Default)]
pub struct InMemoryMessageStore {
    inner: RwLock<Inner>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages stored for `room`.
    pub async fn count(&self, room: &RoomKey) -> usize {
        let inner = self.inner.read().await;
        inner.rooms.get(room).map_or(0, Vec::len)
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert_message(
        &self,
        id: MessageId,
        created_at: Timestamp,
        message: NewMessage,
    ) -> Result<Message, RepositoryError> {
        let mut inner = self.inner.write().await;
        inner.last_seq += 1;
        let stored = Message {
            id,
            seq: Sequence::new(inner.last_seq),
            room: message.room,
            sender: message.sender,
            receiver: message.receiver,
            body: message.body,
            attachment: message.attachment,
            client_message_id: message.client_message_id,
            created_at,
        };
        inner
            .rooms
            .entry(stored.room.clone())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn query_messages(
        &self,
        room: &RoomKey,
        before: Option<Sequence>,
        limit: usize,
    ) -> Result<Vec<Message>, RepositoryError> {
        let inner = self.inner.read().await;
        let Some(messages) = inner.rooms.get(room) else {
            return Ok(Vec::new());
        };
        // Stored in sequence order, so the cut point is a binary search.
        let end = match before {
            Some(cursor) => messages.partition_point(|m| m.seq < cursor),
            None => messages.len(),
        };
        let start = end.saturating_sub(limit);
        Ok(messages[start..end].to_vec())
    }

    async fn find_by_client_message_id(
        &self,
        room: &RoomKey,
        sender: &UserId,
        client_message_id: &ClientMessageId,
    ) -> Result<Option<Message>, RepositoryError> {
        let inner = self.inner.read().await;
        let found = inner.rooms.get(room).and_then(|messages| {
            messages
                .iter()
                .rev()
                .find(|m| {
                    &m.sender == sender && m.client_message_id.as_ref() == Some(client_message_id)
                })
                .cloned()
        });
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageBody;

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn draft(text: &str, token: Option<&str>) -> NewMessage {
        let sender = user("p-1");
        let receiver = user("d-1");
        NewMessage {
            room: RoomKey::for_pair(&sender, &receiver),
            sender,
            receiver,
            body: MessageBody::parse(text).unwrap(),
            attachment: None,
            client_message_id: token.map(|t| ClientMessageId::new(t.to_string()).unwrap()),
        }
    }

    async fn insert(store: &InMemoryMessageStore, text: &str) -> Message {
        store
            .insert_message(MessageId::generate(), Timestamp::new(1_000), draft(text, None))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_room_returns_empty_history() {
        // テスト項目: メッセージのないルームは空の履歴を返す（エラーではない）
        // given (前提条件):
        let store = InMemoryMessageStore::new();
        let room = RoomKey::for_pair(&user("p-1"), &user("d-1"));

        // when (操作):
        let result = store.query_messages(&room, None, 50).await;

        // then (期待する結果):
        assert_eq!(result, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_sequence() {
        // テスト項目: 挿入ごとに単調増加するシーケンスが割り当てられる
        // given (前提条件):
        let store = InMemoryMessageStore::new();

        // when (操作):
        let first = insert(&store, "one").await;
        let second = insert(&store, "two").await;

        // then (期待する結果):
        assert!(second.seq > first.seq);
        assert_eq!(store.count(&first.room).await, 2);
    }

    #[tokio::test]
    async fn test_query_pages_backwards_oldest_first() {
        // テスト項目: before カーソルより古いメッセージを limit 件、古い順で返す
        // given (前提条件):
        let store = InMemoryMessageStore::new();
        let mut inserted = Vec::new();
        for i in 0..5 {
            inserted.push(insert(&store, &format!("m{i}")).await);
        }
        let room = inserted[0].room.clone();

        // when (操作):
        let latest = store.query_messages(&room, None, 2).await.unwrap();
        let older = store
            .query_messages(&room, Some(latest[0].seq), 2)
            .await
            .unwrap();

        // then (期待する結果):
        let bodies = |page: &[Message]| -> Vec<String> {
            page.iter()
                .map(|m| m.body.as_ref().unwrap().as_str().to_string())
                .collect()
        };
        assert_eq!(bodies(&latest), vec!["m3", "m4"]);
        assert_eq!(bodies(&older), vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_find_by_client_message_id() {
        // テスト項目: 送信者とクライアントメッセージ ID で保存済みメッセージを検索できる
        // given (前提条件):
        let store = InMemoryMessageStore::new();
        let stored = store
            .insert_message(MessageId::generate(), Timestamp::new(1), draft("hi", Some("c-1")))
            .await
            .unwrap();
        let token = ClientMessageId::new("c-1".to_string()).unwrap();

        // when (操作):
        let found = store
            .find_by_client_message_id(&stored.room, &user("p-1"), &token)
            .await
            .unwrap();
        let other_sender = store
            .find_by_client_message_id(&stored.room, &user("d-1"), &token)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(found.map(|m| m.id), Some(stored.id));
        assert!(other_sender.is_none());
    }
}
