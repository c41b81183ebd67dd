use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::session::Session;
use super::{JoinCode, SocketId};
use crate::error::{GameError, Result};

/// A session shared between every connection of its room and its timer
pub type SharedSession = Arc<Mutex<Session>>;

#[derive(Default)]
struct Buckets {
    /// Sessions still accepting new players
    lobby: HashMap<JoinCode, SharedSession>,
    /// Sessions with a game in progress or finished
    active: HashMap<JoinCode, SharedSession>,
    /// Connection -> room it belongs to
    participants: HashMap<SocketId, JoinCode>,
}

impl Buckets {
    fn contains(&self, code: JoinCode) -> bool {
        self.lobby.contains_key(&code) || self.active.contains_key(&code)
    }

    fn get(&self, code: JoinCode) -> Option<&SharedSession> {
        self.lobby.get(&code).or_else(|| self.active.get(&code))
    }

    fn remove(&mut self, code: JoinCode) -> Option<SharedSession> {
        let removed = self
            .lobby
            .remove(&code)
            .or_else(|| self.active.remove(&code));

        if removed.is_some() {
            self.participants.retain(|_, bound| *bound != code);
            tracing::debug!(join_code = code, "Session removed from store");
        }
        removed
    }
}

/// Registry of live sessions
///
/// Lobby and active buckets share one join code namespace and one lock, so a
/// session is always in exactly one of them. The store only guards its own
/// maps; mutating a session means locking that session.
///
/// Lock order is session first, then store. Nothing here waits on a session
/// lock while the store lock is held.
#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<Buckets>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new lobby session under its join code and binds the
    /// host's connection to it
    pub async fn create(&self, session: Session) -> Result<SharedSession> {
        let code = session.join_code;
        let host_socket_id = session.host_socket_id.clone();

        let mut buckets = self.inner.write().await;
        if buckets.contains(code) {
            return Err(GameError::DuplicateCode(code));
        }

        let shared = Arc::new(Mutex::new(session));
        buckets.lobby.insert(code, shared.clone());
        buckets.participants.insert(host_socket_id, code);

        tracing::debug!(join_code = code, "Session stored in lobby");
        Ok(shared)
    }

    pub async fn exists(&self, code: JoinCode) -> bool {
        self.inner.read().await.contains(code)
    }

    pub async fn get(&self, code: JoinCode) -> Option<SharedSession> {
        self.inner.read().await.get(code).cloned()
    }

    pub async fn is_active(&self, code: JoinCode) -> bool {
        self.inner.read().await.active.contains_key(&code)
    }

    /// Moves a session from the lobby to the active bucket
    pub async fn promote(&self, code: JoinCode) -> bool {
        let mut buckets = self.inner.write().await;
        match buckets.lobby.remove(&code) {
            Some(session) => {
                buckets.active.insert(code, session);
                tracing::debug!(join_code = code, "Session promoted to active");
                true
            }
            None => false,
        }
    }

    /// Removes a session from whichever bucket holds it, along with every
    /// connection bound to it
    pub async fn remove(&self, code: JoinCode) -> Option<SharedSession> {
        let mut buckets = self.inner.write().await;
        buckets.remove(code)
    }

    /// Removes the session only if the code still maps to this exact session
    pub async fn remove_if_same(&self, code: JoinCode, session: &SharedSession) -> bool {
        let mut buckets = self.inner.write().await;
        let same = buckets
            .get(code)
            .is_some_and(|current| Arc::ptr_eq(current, session));
        same && buckets.remove(code).is_some()
    }

    pub async fn find_by_participant(&self, socket_id: &str) -> Option<(JoinCode, SharedSession)> {
        let buckets = self.inner.read().await;
        let code = *buckets.participants.get(socket_id)?;
        buckets.get(code).map(|session| (code, session.clone()))
    }

    pub async fn bind_participant(&self, socket_id: SocketId, code: JoinCode) {
        self.inner.write().await.participants.insert(socket_id, code);
    }

    pub async fn unbind_participant(&self, socket_id: &str) {
        self.inner.write().await.participants.remove(socket_id);
    }

    /// (lobby, active) session counts
    pub async fn counts(&self) -> (usize, usize) {
        let buckets = self.inner.read().await;
        (buckets.lobby.len(), buckets.active.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(code: JoinCode, host_socket: &str) -> Session {
        Session::new(code, "quiz".into(), "host".into(), host_socket.into())
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let store = SessionStore::new();
        store.create(session(111111, "h1")).await.unwrap();

        assert!(store.exists(111111).await);
        assert!(!store.is_active(111111).await);
        assert!(store.get(111111).await.is_some());

        let (code, _) = store.find_by_participant("h1").await.unwrap();
        assert_eq!(code, 111111);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected_across_buckets() {
        let store = SessionStore::new();
        store.create(session(111111, "h1")).await.unwrap();

        let err = store.create(session(111111, "h2")).await.unwrap_err();
        assert!(matches!(err, GameError::DuplicateCode(111111)));

        assert!(store.promote(111111).await);
        let err = store.create(session(111111, "h3")).await.unwrap_err();
        assert!(matches!(err, GameError::DuplicateCode(111111)));
    }

    #[tokio::test]
    async fn test_promote_moves_between_buckets() {
        let store = SessionStore::new();
        store.create(session(222222, "h1")).await.unwrap();

        assert!(store.promote(222222).await);
        assert!(store.is_active(222222).await);
        assert_eq!(store.counts().await, (0, 1));

        // already active
        assert!(!store.promote(222222).await);
        assert_eq!(store.counts().await, (0, 1));
    }

    #[tokio::test]
    async fn test_remove_unbinds_participants() {
        let store = SessionStore::new();
        store.create(session(333333, "h1")).await.unwrap();
        store.bind_participant("p1".into(), 333333).await;
        store.promote(333333).await;

        assert!(store.remove(333333).await.is_some());
        assert!(!store.exists(333333).await);
        assert!(store.find_by_participant("h1").await.is_none());
        assert!(store.find_by_participant("p1").await.is_none());

        // code is free again
        assert!(store.create(session(333333, "h2")).await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_if_same_ignores_replacement() {
        let store = SessionStore::new();
        let first = store.create(session(444444, "h1")).await.unwrap();
        store.remove(444444).await;
        let second = store.create(session(444444, "h2")).await.unwrap();

        assert!(!store.remove_if_same(444444, &first).await);
        assert!(store.exists(444444).await);
        assert!(store.remove_if_same(444444, &second).await);
        assert!(!store.exists(444444).await);
    }

    #[tokio::test]
    async fn test_unbind_participant() {
        let store = SessionStore::new();
        store.create(session(555555, "h1")).await.unwrap();
        store.bind_participant("p1".into(), 555555).await;
        store.unbind_participant("p1").await;

        assert!(store.find_by_participant("p1").await.is_none());
        assert!(store.find_by_participant("h1").await.is_some());
    }
}
