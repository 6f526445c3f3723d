//! Shared application state.

use std::sync::Arc;

use crate::{
    domain::PresenceRegistry, infrastructure::dto::conversion::EventEncoder,
    usecase::ChatSessionManager,
};

/// Shared application state
pub struct AppState {
    /// ChatSessionManager（接続ごとのセッションを生成するユースケース）
    pub sessions: Arc<ChatSessionManager>,
    /// PresenceRegistry（オンライン状態の参照用）
    pub presence: Arc<dyn PresenceRegistry>,
    /// Domain → DTO のエンコーダ
    pub encoder: EventEncoder,
}
