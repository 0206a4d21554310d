use std::sync::Mutex;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::KvStore;

/// Store key for the persisted session.
const SESSION_KEY: &str = "session";

/// Cache key used before sign-in or when no user can be derived.
const ANONYMOUS_CACHE_KEY: &str = "workouts_anonymous";

/// Explicit session state. Being signed in is a matter of which variant is
/// held, never of some string being present in storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionState {
    Anonymous,
    Authenticated {
        username: String,
        access_token: String,
        refresh_token: String,
    },
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Anonymous
    }
}

/// Owner of the current session, persisted through the key-value store.
///
/// Shared between the API client (which reads tokens and rotates the access
/// token) and the application (which signs in and out), so all methods take
/// `&self` and synchronize internally.
pub struct SessionStore {
    store: KvStore,
    state: Mutex<SessionState>,
}

impl SessionStore {
    /// Load the persisted session; a missing or corrupt entry means anonymous.
    pub fn load(store: KvStore) -> Self {
        let state: SessionState = store.get(SESSION_KEY).unwrap_or_default();
        debug!(
            authenticated = matches!(state, SessionState::Authenticated { .. }),
            "Session loaded"
        );
        Self {
            store,
            state: Mutex::new(state),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.lock().unwrap(), SessionState::Authenticated { .. })
    }

    pub fn username(&self) -> Option<String> {
        match &*self.state.lock().unwrap() {
            SessionState::Authenticated { username, .. } => Some(username.clone()),
            SessionState::Anonymous => None,
        }
    }

    pub fn access_token(&self) -> Option<String> {
        match &*self.state.lock().unwrap() {
            SessionState::Authenticated { access_token, .. } => Some(access_token.clone()),
            SessionState::Anonymous => None,
        }
    }

    pub fn refresh_token(&self) -> Option<String> {
        match &*self.state.lock().unwrap() {
            SessionState::Authenticated { refresh_token, .. } => Some(refresh_token.clone()),
            SessionState::Anonymous => None,
        }
    }

    /// Key under which this user's workout collection is cached.
    pub fn cache_key(&self) -> String {
        match self.username() {
            Some(username) => format!("workouts_user_{}", username),
            None => ANONYMOUS_CACHE_KEY.to_string(),
        }
    }

    /// Store a fresh token pair after login or registration.
    pub fn sign_in(&self, username: String, access_token: String, refresh_token: String) -> Result<()> {
        let state = SessionState::Authenticated {
            username,
            access_token,
            refresh_token,
        };
        self.store.set(SESSION_KEY, &state)?;
        *self.state.lock().unwrap() = state;
        Ok(())
    }

    /// Replace the access token after a refresh exchange, keeping the
    /// refresh token. No-op when anonymous.
    pub fn rotate_access(&self, access_token: String) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let SessionState::Authenticated {
            access_token: current,
            ..
        } = &mut *state
        {
            *current = access_token;
            self.store.set(SESSION_KEY, &*state)?;
        }
        Ok(())
    }

    /// Destroy the session: tokens gone from memory and from disk.
    pub fn sign_out(&self) -> Result<()> {
        *self.state.lock().unwrap() = SessionState::Anonymous;
        self.store.remove(SESSION_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_session() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::new(dir.path().to_path_buf()).unwrap();
        (dir, SessionStore::load(store))
    }

    #[test]
    fn starts_anonymous() {
        let (_dir, session) = temp_session();
        assert!(!session.is_authenticated());
        assert_eq!(session.access_token(), None);
        assert_eq!(session.cache_key(), "workouts_anonymous");
    }

    #[test]
    fn sign_in_persists_and_derives_cache_key() {
        let (dir, session) = temp_session();
        session
            .sign_in("maria".into(), "acc".into(), "ref".into())
            .unwrap();
        assert_eq!(session.cache_key(), "workouts_user_maria");

        // Reload from disk through a second store instance
        let store = KvStore::new(dir.path().to_path_buf()).unwrap();
        let reloaded = SessionStore::load(store);
        assert!(reloaded.is_authenticated());
        assert_eq!(reloaded.access_token().as_deref(), Some("acc"));
        assert_eq!(reloaded.refresh_token().as_deref(), Some("ref"));
    }

    #[test]
    fn rotate_access_keeps_refresh_token() {
        let (_dir, session) = temp_session();
        session
            .sign_in("maria".into(), "old".into(), "ref".into())
            .unwrap();
        session.rotate_access("new".into()).unwrap();
        assert_eq!(session.access_token().as_deref(), Some("new"));
        assert_eq!(session.refresh_token().as_deref(), Some("ref"));
    }

    #[test]
    fn sign_out_clears_state_and_disk() {
        let (dir, session) = temp_session();
        session
            .sign_in("maria".into(), "acc".into(), "ref".into())
            .unwrap();
        session.sign_out().unwrap();
        assert!(!session.is_authenticated());

        let store = KvStore::new(dir.path().to_path_buf()).unwrap();
        assert!(!SessionStore::load(store).is_authenticated());
    }

    #[test]
    fn corrupt_session_entry_degrades_to_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::new(dir.path().to_path_buf()).unwrap();
        std::fs::write(dir.path().join("session.json"), "{broken").unwrap();
        let session = SessionStore::load(store);
        assert!(!session.is_authenticated());
    }
}
