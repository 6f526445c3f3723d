//! UseCase: ユーザー接続処理
//!
//! 接続を MessagePusher と PresenceRegistry に登録し、ユーザーが
//! オフラインからオンラインに変わった場合のみ他の接続へ通知する。

use std::sync::Arc;

use crate::domain::{
    ConnectionId, MessagePusher, OutboundEvent, PresenceRegistry, PresenceTransition,
    PusherChannel, UserId,
};

use super::presence_gate::PresenceGate;

/// 接続結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedUser {
    pub connection_id: ConnectionId,
    /// Snapshot for the new client's initial sync, sorted, including itself.
    pub online_users: Vec<UserId>,
}

/// ユーザー接続のユースケース
pub struct ConnectUserUseCase {
    presence: Arc<dyn PresenceRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    gate: Arc<PresenceGate>,
}

impl ConnectUserUseCase {
    pub fn new(
        presence: Arc<dyn PresenceRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
        gate: Arc<PresenceGate>,
    ) -> Self {
        Self {
            presence,
            message_pusher,
            gate,
        }
    }

    /// ユーザー接続を実行
    ///
    /// The connection is registered with the pusher before presence, so a
    /// peer that sees the user come online can already reach it.
    pub async fn execute(&self, user: UserId, sender: PusherChannel) -> ConnectedUser {
        let connection_id = ConnectionId::generate();

        self.message_pusher
            .register_connection(connection_id, user.clone(), sender)
            .await;

        let _turn = self.gate.enter().await;
        let transition = self.presence.register_connection(&user, connection_id);
        let online_users = self.presence.list_online();

        if transition == PresenceTransition::CameOnline {
            tracing::info!("'{}' is now online", user);
            let event = OutboundEvent::PresenceChanged {
                user_id: user,
                online: true,
            };
            if let Err(e) = self
                .message_pusher
                .broadcast(&event, Some(&connection_id))
                .await
            {
                tracing::warn!("Failed to broadcast presence change: {}", e);
            }
        }

        ConnectedUser {
            connection_id,
            online_users,
        }
    }
}
