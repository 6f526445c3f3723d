//! Process-local presence registry.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use crate::domain::{ConnectionId, PresenceRegistry, PresenceTransition, UserId};

/// User id → open connection handles.
///
/// A plain `std` mutex: every operation is a short map update and never
/// awaits while holding the lock.
#[derive(Default)]
pub struct InMemoryPresenceRegistry {
    connections: Mutex<HashMap<UserId, HashSet<ConnectionId>>>,
}

impl InMemoryPresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, HashSet<ConnectionId>>> {
        // Poisoning is ignored: no operation leaves the map half-updated.
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PresenceRegistry for InMemoryPresenceRegistry {
    fn register_connection(&self, user: &UserId, connection: ConnectionId) -> PresenceTransition {
        let mut connections = self.lock();
        let handles = connections.entry(user.clone()).or_default();
        let was_offline = handles.is_empty();
        handles.insert(connection);
        if was_offline {
            tracing::debug!("User '{}' is now online", user);
            PresenceTransition::CameOnline
        } else {
            PresenceTransition::Unchanged
        }
    }

    fn unregister_connection(&self, user: &UserId, connection: ConnectionId) -> PresenceTransition {
        let mut connections = self.lock();
        let Some(handles) = connections.get_mut(user) else {
            return PresenceTransition::Unchanged;
        };
        if !handles.remove(&connection) {
            return PresenceTransition::Unchanged;
        }
        if handles.is_empty() {
            connections.remove(user);
            tracing::debug!("User '{}' is now offline", user);
            PresenceTransition::WentOffline
        } else {
            PresenceTransition::Unchanged
        }
    }

    fn is_online(&self, user: &UserId) -> bool {
        self.lock()
            .get(user)
            .is_some_and(|handles| !handles.is_empty())
    }

    fn list_online(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.lock().keys().cloned().collect();
        users.sort();
        users
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    #[test]
    fn test_register_then_unregister_goes_offline() {
        // テスト項目: 接続して切断すると offline になる
        // given (前提条件):
        let registry = InMemoryPresenceRegistry::new();
        let u = user("p-1");
        let c1 = ConnectionId::generate();

        // when (操作):
        let joined = registry.register_connection(&u, c1);
        let left = registry.unregister_connection(&u, c1);

        // then (期待する結果):
        assert_eq!(joined, PresenceTransition::CameOnline);
        assert_eq!(left, PresenceTransition::WentOffline);
        assert!(!registry.is_online(&u));
    }

    #[test]
    fn test_second_connection_keeps_user_online() {
        // テスト項目: 2 接続のうち 1 つを切断しても online のまま
        // given (前提条件):
        let registry = InMemoryPresenceRegistry::new();
        let u = user("p-1");
        let c1 = ConnectionId::generate();
        let c2 = ConnectionId::generate();
        registry.register_connection(&u, c1);

        // when (操作):
        let second = registry.register_connection(&u, c2);
        let left = registry.unregister_connection(&u, c1);

        // then (期待する結果):
        assert_eq!(second, PresenceTransition::Unchanged);
        assert_eq!(left, PresenceTransition::Unchanged);
        assert!(registry.is_online(&u));
    }

    #[test]
    fn test_duplicate_register_is_idempotent() {
        // テスト項目: 同じハンドルの二重登録は冪等で、1 回の切断で offline になる
        // given (前提条件):
        let registry = InMemoryPresenceRegistry::new();
        let u = user("p-1");
        let c1 = ConnectionId::generate();

        // when (操作):
        registry.register_connection(&u, c1);
        let again = registry.register_connection(&u, c1);
        let left = registry.unregister_connection(&u, c1);

        // then (期待する結果):
        assert_eq!(again, PresenceTransition::Unchanged);
        assert_eq!(left, PresenceTransition::WentOffline);
    }

    #[test]
    fn test_unregister_unknown_handle_is_noop() {
        // テスト項目: 未登録ハンドルの切断は何もしない（パニックしない）
        // given (前提条件):
        let registry = InMemoryPresenceRegistry::new();
        let u = user("p-1");
        let registered = ConnectionId::generate();
        registry.register_connection(&u, registered);

        // when (操作):
        let stranger = registry.unregister_connection(&user("ghost"), ConnectionId::generate());
        let wrong_handle = registry.unregister_connection(&u, ConnectionId::generate());

        // then (期待する結果):
        assert_eq!(stranger, PresenceTransition::Unchanged);
        assert_eq!(wrong_handle, PresenceTransition::Unchanged);
        assert!(registry.is_online(&u));
    }

    #[test]
    fn test_list_online_is_sorted_snapshot() {
        // テスト項目: オンラインユーザー一覧はソート済み
        // given (前提条件):
        let registry = InMemoryPresenceRegistry::new();
        registry.register_connection(&user("charlie"), ConnectionId::generate());
        registry.register_connection(&user("alice"), ConnectionId::generate());
        registry.register_connection(&user("bob"), ConnectionId::generate());

        // when (操作):
        let online = registry.list_online();

        // then (期待する結果):
        assert_eq!(online, vec![user("alice"), user("bob"), user("charlie")]);
    }
}
