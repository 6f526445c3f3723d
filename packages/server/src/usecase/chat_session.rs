//! UseCase: チャットセッション
//!
//! One [`ChatSession`] per connection. It starts `Idle`, moves to `Joined`
//! on a successful join (one room at a time; joining another room leaves the
//! previous one) and ends with [`ChatSession::close`], which consumes it.

use std::sync::Arc;

use crate::domain::{
    AccessDecision, AttachmentRef, ClientMessageId, ConnectionId, Conversation, DenyReason,
    HistoryPage, Message, MessageBody, MessagePusher, NewMessage, OutboundEvent, PusherChannel,
    Role, Sequence, UserId, ValueObjectError,
};

use super::{
    connect_user::ConnectUserUseCase, conversation::ConversationResolver,
    disconnect_user::DisconnectUserUseCase, error::ChatError,
    message_store::MessageStoreGateway, notification::NotificationDispatcher,
};

/// Per-connection protocol state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Joined(Conversation),
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub conversation: Conversation,
    pub peer: UserId,
    pub access: AccessDecision,
    pub history: HistoryPage,
}

/// Shared by every session of the process.
pub struct ChatSessionManager {
    resolver: ConversationResolver,
    gateway: MessageStoreGateway,
    message_pusher: Arc<dyn MessagePusher>,
    dispatcher: NotificationDispatcher,
    connect: ConnectUserUseCase,
    disconnect: DisconnectUserUseCase,
}

impl ChatSessionManager {
    pub fn new(
        resolver: ConversationResolver,
        gateway: MessageStoreGateway,
        message_pusher: Arc<dyn MessagePusher>,
        dispatcher: NotificationDispatcher,
        connect: ConnectUserUseCase,
        disconnect: DisconnectUserUseCase,
    ) -> Self {
        Self {
            resolver,
            gateway,
            message_pusher,
            dispatcher,
            connect,
            disconnect,
        }
    }

    /// Register a new connection and return its session together with the
    /// online-users snapshot for the initial sync.
    pub async fn open(
        self: &Arc<Self>,
        user: UserId,
        role: Role,
        sender: PusherChannel,
    ) -> (ChatSession, Vec<UserId>) {
        let connected = self.connect.execute(user.clone(), sender).await;
        tracing::info!(
            "Session opened for {} '{}' (connection {})",
            role,
            user,
            connected.connection_id
        );
        let session = ChatSession {
            manager: Arc::clone(self),
            connection_id: connected.connection_id,
            user,
            role,
            state: SessionState::Idle,
        };
        (session, connected.online_users)
    }

    /// History of a conversation outside of any session, with its access decision.
    ///
    /// `requester` must hold the slot of `role` in the conversation, as for a join.
    pub async fn conversation_history(
        &self,
        requester: &UserId,
        role: Role,
        patient: UserId,
        doctor: UserId,
        limit: Option<usize>,
        before: Option<Sequence>,
    ) -> Result<(AccessDecision, HistoryPage), ChatError> {
        let conversation = Conversation::new(patient, doctor).map_err(invalid_request)?;
        ensure_participant(requester, role, &conversation)?;
        let access = self
            .resolver
            .access_mode(&conversation.patient, &conversation.doctor)
            .await?;
        let page = self
            .gateway
            .history(&conversation.room, limit, before)
            .await?;
        Ok((access, page))
    }
}

fn invalid_request(error: ValueObjectError) -> ChatError {
    ChatError::InvalidRequest(error.to_string())
}

fn ensure_participant(user: &UserId, role: Role, conversation: &Conversation) -> Result<(), ChatError> {
    let own_slot = match role {
        Role::Patient => &conversation.patient,
        Role::Doctor => &conversation.doctor,
    };
    if own_slot != user {
        tracing::warn!(
            "'{}' ({}) is not part of room {}",
            user,
            role,
            conversation.room
        );
        return Err(ChatError::AccessDenied {
            reason: DenyReason::NotParticipant,
        });
    }
    Ok(())
}

/// The state of one open connection.
pub struct ChatSession {
    manager: Arc<ChatSessionManager>,
    connection_id: ConnectionId,
    user: UserId,
    role: Role,
    state: SessionState,
}

impl ChatSession {
    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Join the conversation between `patient` and `doctor`.
    ///
    /// The connected user must occupy the slot matching its role. On failure
    /// the session keeps its previous room, except when the history read
    /// fails after the switch, which leaves the session `Idle`.
    ///
    /// # Errors
    ///
    /// * `InvalidRequest` - both ids are the same user
    /// * `AccessDenied(not_participant)` - the user is not the pair's patient or doctor
    /// * `NoAppointmentFound` - the pair never had an appointment
    /// * `PersistenceError` / `Timeout` - a store failed or stalled
    pub async fn join(&mut self, patient: UserId, doctor: UserId) -> Result<JoinOutcome, ChatError> {
        let conversation = Conversation::new(patient, doctor).map_err(invalid_request)?;
        ensure_participant(&self.user, self.role, &conversation)?;

        let access = self
            .manager
            .resolver
            .access_mode(&conversation.patient, &conversation.doctor)
            .await?;

        // Subscribe before reading history so nothing sent in between is
        // missed; the client drops the overlap by message id.
        let previous = self
            .manager
            .message_pusher
            .subscribe(&self.connection_id, conversation.room.clone())
            .await;
        if let Some(previous) = previous.filter(|room| room != &conversation.room) {
            tracing::debug!("Connection {} left room {}", self.connection_id, previous);
        }

        let history = match self
            .manager
            .gateway
            .history(&conversation.room, None, None)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                self.manager
                    .message_pusher
                    .unsubscribe(&self.connection_id)
                    .await;
                self.state = SessionState::Idle;
                return Err(e);
            }
        };

        let peer = match self.role {
            Role::Patient => conversation.doctor.clone(),
            Role::Doctor => conversation.patient.clone(),
        };
        tracing::info!(
            "'{}' joined room {} ({:?}, {} messages)",
            self.user,
            conversation.room,
            access.mode,
            history.messages.len()
        );
        self.state = SessionState::Joined(conversation.clone());
        Ok(JoinOutcome {
            conversation,
            peer,
            access,
            history,
        })
    }

    fn joined_with(&self, peer: &UserId) -> Result<&Conversation, ChatError> {
        match &self.state {
            SessionState::Joined(conversation) if conversation.peer_of(&self.user) == Some(peer) => {
                Ok(conversation)
            }
            _ => Err(ChatError::NotJoined(peer.to_string())),
        }
    }

    /// Persist a message to the joined conversation and deliver it.
    ///
    /// Access is re-checked against the appointment store on every call.
    /// The message is broadcast only after it was persisted, to every
    /// connection subscribed to the room (the sender's included), and the
    /// receiver is alerted out of band if offline. A retry carrying an
    /// already-stored `client_message_id` is answered to this connection only.
    pub async fn send(
        &self,
        peer: &UserId,
        body: Option<MessageBody>,
        attachment: Option<AttachmentRef>,
        client_message_id: Option<ClientMessageId>,
    ) -> Result<Message, ChatError> {
        let conversation = self.joined_with(peer)?.clone();
        if body.is_none() && attachment.is_none() {
            return Err(ChatError::InvalidRequest(
                "message must carry a body or an attachment".to_string(),
            ));
        }

        let access = self
            .manager
            .resolver
            .access_mode(&conversation.patient, &conversation.doctor)
            .await?;
        if !access.can_send() {
            let reason = access.reason.unwrap_or(DenyReason::UnknownStatus);
            tracing::warn!(
                "Send by '{}' to room {} denied: {}",
                self.user,
                conversation.room,
                reason
            );
            return Err(ChatError::AccessDenied { reason });
        }

        let appended = self
            .manager
            .gateway
            .append(NewMessage {
                room: conversation.room.clone(),
                sender: self.user.clone(),
                receiver: peer.clone(),
                body,
                attachment,
                client_message_id,
            })
            .await?;

        let event = OutboundEvent::MessageReceived(appended.message.clone());
        if appended.duplicate {
            if let Err(e) = self
                .manager
                .message_pusher
                .push_to(&self.connection_id, &event)
                .await
            {
                tracing::warn!("Failed to echo duplicate message to {}: {}", self.connection_id, e);
            }
            return Ok(appended.into_message());
        }

        match self
            .manager
            .message_pusher
            .publish_to_room(&conversation.room, &event)
            .await
        {
            Ok(delivered) => tracing::debug!(
                "Message {} delivered to {} connection(s) in room {}",
                appended.message.id,
                delivered,
                conversation.room
            ),
            Err(e) => tracing::error!(
                "Failed to publish message {} to room {}: {}",
                appended.message.id,
                conversation.room,
                e
            ),
        }
        let message = appended.into_message();

        self.manager.dispatcher.notify(&message);
        Ok(message)
    }

    /// Page older messages of the joined conversation.
    pub async fn load_history(
        &self,
        peer: &UserId,
        before: Option<Sequence>,
        limit: Option<usize>,
    ) -> Result<HistoryPage, ChatError> {
        let conversation = self.joined_with(peer)?;
        self.manager
            .gateway
            .history(&conversation.room, limit, before)
            .await
    }

    /// Leave the current room. With `peer` set, only a conversation with that
    /// peer is left. Idempotent; returns whether a room was left.
    pub async fn leave(&mut self, peer: Option<&UserId>) -> bool {
        let SessionState::Joined(conversation) = &self.state else {
            return false;
        };
        if let Some(peer) = peer
            && conversation.peer_of(&self.user) != Some(peer)
        {
            return false;
        }
        tracing::info!("'{}' left room {}", self.user, conversation.room);
        self.manager
            .message_pusher
            .unsubscribe(&self.connection_id)
            .await;
        self.state = SessionState::Idle;
        true
    }

    /// Terminal transition: leave the room and release presence.
    pub async fn close(mut self) {
        self.leave(None).await;
        self.manager
            .disconnect
            .execute(&self.user, self.connection_id)
            .await;
        tracing::info!(
            "Session closed for '{}' (connection {})",
            self.user,
            self.connection_id
        );
    }
}
