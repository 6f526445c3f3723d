//! メッセージ送信（通知）の実装
//!
//! ## 実装
//!
//! - `websocket`: 単一プロセス内の WebSocket 接続への配信
//! - 将来的に: `redis` など、複数プロセス間でのファンアウト

pub mod websocket;

pub use websocket::WebSocketMessagePusher;
