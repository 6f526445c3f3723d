//! UseCase: ユーザー切断処理

use std::sync::Arc;

use crate::domain::{
    ConnectionId, MessagePusher, OutboundEvent, PresenceRegistry, PresenceTransition, UserId,
};

use super::presence_gate::PresenceGate;

/// ユーザー切断のユースケース
pub struct DisconnectUserUseCase {
    presence: Arc<dyn PresenceRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    gate: Arc<PresenceGate>,
}

impl DisconnectUserUseCase {
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

    /// ユーザー切断を実行
    ///
    /// Safe to call for a connection that was never registered or is already
    /// gone. Returns the presence transition it caused.
    pub async fn execute(&self, user: &UserId, connection_id: ConnectionId) -> PresenceTransition {
        self.message_pusher
            .unregister_connection(&connection_id)
            .await;

        let _turn = self.gate.enter().await;
        let transition = self.presence.unregister_connection(user, connection_id);

        if transition == PresenceTransition::WentOffline {
            tracing::info!("'{}' is now offline", user);
            let event = OutboundEvent::PresenceChanged {
                user_id: user.clone(),
                online: false,
            };
            if let Err(e) = self.message_pusher.broadcast(&event, None).await {
                tracing::warn!("Failed to broadcast presence change: {}", e);
            }
        }
        transition
    }
}
