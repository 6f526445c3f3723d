//! Presence registry interface.

use super::value_object::{ConnectionId, UserId};

/// Result of a registry mutation, from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceTransition {
    /// First connection of the user: offline → online.
    CameOnline,
    /// Last connection closed: online → offline.
    WentOffline,
    Unchanged,
}

/// Which users currently hold at least one open connection.
///
/// Mutations are atomic and never suspend. A distributed implementation can
/// be injected in place of the in-memory one.
pub trait PresenceRegistry: Send + Sync {
    /// Idempotent for a handle that is already registered.
    fn register_connection(&self, user: &UserId, connection: ConnectionId) -> PresenceTransition;

    /// No-op for a handle that was never registered.
    fn unregister_connection(&self, user: &UserId, connection: ConnectionId) -> PresenceTransition;

    fn is_online(&self, user: &UserId) -> bool;

    /// Snapshot of online users, sorted.
    fn list_online(&self) -> Vec<UserId>;
}
