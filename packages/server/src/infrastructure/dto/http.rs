//! HTTP API DTOs.

use serde::{Deserialize, Serialize};

use super::websocket::{AccessDto, MessageDto};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUsersDto {
    pub user_ids: Vec<String>,
}

/// Query parameters for history paging.
///
/// `user_id` and `role` identify the caller the same way the WebSocket
/// handshake does.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub user_id: String,
    pub role: String,
    pub limit: Option<usize>,
    pub before: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPageDto {
    pub room_key: String,
    pub access: AccessDto,
    pub messages: Vec<MessageDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDto {
    pub code: String,
    pub reason: String,
}
