//! Request handlers.

mod http;
mod websocket;

pub use http::{conversation_messages, health_check, online_users};
pub use websocket::websocket_handler;
