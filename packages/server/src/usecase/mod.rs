//! UseCase 層
//!
//! - `conversation`: ルームキーの導出と予約ステータスによる読み書き判定
//! - `message_store`: メッセージの永続化と履歴取得（ルーム単位で書き込みを直列化）
//! - `notification`: 受信者がオフラインのときのプッシュ通知
//! - `connect_user` / `disconnect_user`: プレゼンスの登録・解除と通知
//! - `presence_gate`: プレゼンス遷移と通知の順序保証
//! - `chat_session`: 1 接続ごとの状態機械（join / send / leave）

pub mod chat_session;
pub mod connect_user;
pub mod conversation;
pub mod disconnect_user;
pub mod error;
pub mod message_store;
pub mod notification;
pub mod presence_gate;

pub use chat_session::{ChatSession, ChatSessionManager, JoinOutcome, SessionState};
pub use connect_user::{ConnectUserUseCase, ConnectedUser};
pub use conversation::ConversationResolver;
pub use disconnect_user::DisconnectUserUseCase;
pub use error::ChatError;
pub use message_store::{Appended, MessageStoreGateway};
pub use notification::NotificationDispatcher;
pub use presence_gate::PresenceGate;
