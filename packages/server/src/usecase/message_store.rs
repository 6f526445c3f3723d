//! UseCase: メッセージの永続化と履歴取得
//!
//! Writes to one room are serialized through a per-room writer lock. The lock
//! is handed back to the caller inside [`Appended`], so the caller can
//! broadcast before the next write to that room is allowed to start. That
//! keeps live delivery order identical to persisted order.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use clinic_chat_shared::time::Clock;
use tokio::{
    sync::{Mutex as AsyncMutex, OwnedMutexGuard},
    time::Instant,
};

use crate::{
    config::ChatConfig,
    domain::{HistoryPage, Message, MessageId, MessageStore, NewMessage, RoomKey, Sequence, Timestamp},
};

use super::error::{ChatError, with_deadline, with_timeout};

#[derive(Default)]
struct RoomWriter {
    /// `None` until the latest stored timestamp has been loaded.
    last_created_at: Option<i64>,
}

type WriterMap = Arc<Mutex<HashMap<RoomKey, Arc<AsyncMutex<RoomWriter>>>>>;

/// Keeps a room's writer registered while someone is writing or waiting to.
///
/// The last lease of a room removes its writer from the map.
struct WriterLease {
    writers: WriterMap,
    room: RoomKey,
    writer: Arc<AsyncMutex<RoomWriter>>,
}

impl Drop for WriterLease {
    fn drop(&mut self) {
        let mut writers = self
            .writers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // One reference in the map, one here.
        if Arc::strong_count(&self.writer) == 2 {
            writers.remove(&self.room);
        }
    }
}

/// A persisted message, plus the room's write lock.
///
/// Dropping it lets the next write to the room proceed.
pub struct Appended {
    pub message: Message,
    /// The idempotency token matched an earlier message; nothing new was stored.
    pub duplicate: bool,
    // Released before the lease.
    _order: OwnedMutexGuard<RoomWriter>,
    _lease: WriterLease,
}

impl Appended {
    pub fn into_message(self) -> Message {
        self.message
    }
}

pub struct MessageStoreGateway {
    store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    default_page_size: usize,
    max_page_size: usize,
    writers: WriterMap,
}

impl MessageStoreGateway {
    pub fn new(store: Arc<dyn MessageStore>, clock: Arc<dyn Clock>, config: &ChatConfig) -> Self {
        Self {
            store,
            clock,
            timeout: config.store_timeout,
            default_page_size: config.history_page_size.max(1),
            max_page_size: config.max_history_page_size.max(1),
            writers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lease_writer(&self, room: &RoomKey) -> WriterLease {
        let mut writers = self
            .writers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let writer = writers.entry(room.clone()).or_default().clone();
        WriterLease {
            writers: Arc::clone(&self.writers),
            room: room.clone(),
            writer,
        }
    }

    #[cfg(test)]
    fn writer_count(&self) -> usize {
        self.writers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Persist `draft`, assigning its id and server timestamp.
    ///
    /// Timestamps never go backwards within a room, even if the wall clock
    /// does; equal timestamps are ordered by the store's sequence. When the
    /// draft carries a client message id that was already stored for the same
    /// sender, the stored message is returned with `duplicate = true`.
    ///
    /// The whole call, including the wait behind earlier writes to the same
    /// room, is bounded by the store timeout.
    ///
    /// # Errors
    ///
    /// * `PersistenceError` - the store rejected the write or is unavailable
    /// * `Timeout` - the write could not complete in time
    pub async fn append(&self, draft: NewMessage) -> Result<Appended, ChatError> {
        let deadline = Instant::now() + self.timeout;
        let lease = self.lease_writer(&draft.room);
        let queued = Arc::clone(&lease.writer).lock_owned();
        let mut guard = match tokio::time::timeout_at(deadline, queued).await {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!("Timed out waiting for the writer of room {}", draft.room);
                return Err(ChatError::Timeout);
            }
        };

        if let Some(token) = &draft.client_message_id {
            let existing = with_deadline(
                deadline,
                self.store
                    .find_by_client_message_id(&draft.room, &draft.sender, token),
            )
            .await?;
            if let Some(message) = existing {
                tracing::debug!(
                    "Duplicate client message id '{}' in room {}, returning {}",
                    token.as_str(),
                    draft.room,
                    message.id
                );
                return Ok(Appended {
                    message,
                    duplicate: true,
                    _order: guard,
                    _lease: lease,
                });
            }
        }

        // Cleared until the insert succeeds; an interrupted insert may still land.
        let floor = match guard.last_created_at.take() {
            Some(last) => last,
            None => with_deadline(deadline, self.store.query_messages(&draft.room, None, 1))
                .await?
                .last()
                .map_or(i64::MIN, |m| m.created_at.value()),
        };
        let created_at = self.clock.now_millis().max(floor);

        let room = draft.room.clone();
        let message = with_deadline(
            deadline,
            self.store
                .insert_message(MessageId::generate(), Timestamp::new(created_at), draft),
        )
        .await?;
        guard.last_created_at = Some(message.created_at.value());

        tracing::debug!(
            "Persisted message {} (seq {}) in room {}",
            message.id,
            message.seq.value(),
            room
        );
        Ok(Appended {
            message,
            duplicate: false,
            _order: guard,
            _lease: lease,
        })
    }

    /// One page of history, oldest first.
    ///
    /// `limit` defaults to the configured page size and is clamped to the
    /// configured maximum. A room without messages yields an empty page.
    pub async fn history(
        &self,
        room: &RoomKey,
        limit: Option<usize>,
        before: Option<Sequence>,
    ) -> Result<HistoryPage, ChatError> {
        let limit = limit
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);
        let messages = with_timeout(self.timeout, self.store.query_messages(room, before, limit)).await?;
        let next_cursor = if messages.len() == limit {
            messages.first().map(|m| m.seq)
        } else {
            None
        };
        Ok(HistoryPage {
            room: room.clone(),
            messages,
            next_cursor,
        })
    }
}
