//! Infrastructure layer: concrete collaborators and wire formats.

pub mod dto;
pub mod message_pusher;
pub mod presence;
pub mod push;
pub mod repository;
