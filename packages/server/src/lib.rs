//! Patient–doctor chat server.
//!
//! Multiplexes many patient↔doctor conversations over WebSockets, tracks
//! presence, gates sending on the status of the pair's latest appointment,
//! and persists and re-serves message history.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
