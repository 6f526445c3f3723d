//! Data Transfer Objects (DTOs) for the chat server.
//!
//! DTOs are organized by protocol:
//! - `websocket`: WebSocket event DTOs
//! - `http`: HTTP API DTOs
//!
//! `conversion` holds the single place where wire shapes and domain types
//! meet.

pub mod conversion;
pub mod http;
pub mod websocket;
