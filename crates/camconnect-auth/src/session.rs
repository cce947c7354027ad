//! Session token storage with a fixed validity window

use crate::clock::{from_millis, to_millis};
use crate::storage::{keys, KeyValueStore, StoreEdit};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A server-issued session token
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session is still inside its validity window at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        self.issued_at
            .checked_add_signed(timeout)
            .map_or(true, |expires_at| now < expires_at)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &format_args!("<{} chars>", self.token.len()))
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Owns the persisted session token and its issuance time
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    timeout: chrono::Duration,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    /// Load the persisted session, discarding it if it is no longer valid
    pub async fn load(store: Arc<dyn KeyValueStore>, timeout: Duration, now: DateTime<Utc>) -> Self {
        let timeout = chrono::Duration::from_std(timeout)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));

        let token = store.get_string(keys::SESSION_TOKEN).await;
        let issued_at = store
            .get_i64(keys::LAST_AUTH_TIME)
            .await
            .and_then(from_millis);

        let session = match (token, issued_at) {
            (Some(token), Some(issued_at)) => Some(Session { token, issued_at }),
            _ => None,
        };

        let this = Self {
            store,
            timeout,
            current: RwLock::new(None),
        };

        match session {
            Some(session) if session.is_valid_at(now, timeout) => {
                debug!("Valid session loaded from storage");
                *this.current.write().unwrap_or_else(|e| e.into_inner()) = Some(session);
            }
            _ => this.clear().await,
        }
        this
    }

    /// Persist a freshly issued token
    pub async fn store(&self, token: String, now: DateTime<Utc>) {
        let edit = StoreEdit::new()
            .put(keys::SESSION_TOKEN, token.clone())
            .put(keys::LAST_AUTH_TIME, to_millis(now));

        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(Session {
            token,
            issued_at: now,
        });
        if let Err(e) = self.store.apply(edit).await {
            warn!("Failed to persist session token: {}", e);
        }
        debug!("Session token stored successfully");
    }

    /// Current session, whether or not it has expired
    pub fn session(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// True iff a token is present and `now` is inside its window
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.session()
            .is_some_and(|s| s.is_valid_at(now, self.timeout))
    }

    /// The token if it is still valid; expired tokens read as absent
    pub fn read(&self, now: DateTime<Utc>) -> Option<String> {
        self.session()
            .filter(|s| s.is_valid_at(now, self.timeout))
            .map(|s| s.token)
    }

    /// Forget the session in memory and in storage
    pub async fn clear(&self) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = None;
        let edit = StoreEdit::new()
            .remove(keys::SESSION_TOKEN)
            .remove(keys::LAST_AUTH_TIME);
        if let Err(e) = self.store.apply(edit).await {
            warn!("Failed to remove persisted session: {}", e);
        }
        info!("Session cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};
    use chrono::TimeZone;
    use tempfile::tempdir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_validity_window() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let sessions = SessionStore::load(store, DAY, t0()).await;
        sessions.store("tok".to_string(), t0()).await;

        let almost = t0() + chrono::Duration::hours(23) + chrono::Duration::minutes(59);
        assert_eq!(sessions.read(almost).as_deref(), Some("tok"));
        assert!(sessions.is_valid(almost));

        let past = t0() + chrono::Duration::hours(24) + chrono::Duration::minutes(1);
        assert_eq!(sessions.read(past), None);
        assert!(!sessions.is_valid(past));
        assert!(!sessions.is_valid(t0() + chrono::Duration::hours(24)));
    }

    #[tokio::test]
    async fn test_expired_read_does_not_clear_storage() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let sessions = SessionStore::load(store.clone(), DAY, t0()).await;
        sessions.store("tok".to_string(), t0()).await;

        assert_eq!(sessions.read(t0() + chrono::Duration::days(2)), None);
        assert_eq!(
            store.get_string(keys::SESSION_TOKEN).await.as_deref(),
            Some("tok")
        );
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let sessions = SessionStore::load(store.clone(), DAY, t0()).await;
        sessions.store("tok".to_string(), t0()).await;

        sessions.clear().await;
        assert!(sessions.session().is_none());
        assert!(store.get(keys::SESSION_TOKEN).await.is_none());
        assert!(store.get(keys::LAST_AUTH_TIME).await.is_none());
    }

    #[tokio::test]
    async fn test_reload_keeps_valid_session() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        {
            let store: Arc<dyn KeyValueStore> =
                Arc::new(FileStore::with_path(path.clone()).await.unwrap());
            let sessions = SessionStore::load(store, DAY, t0()).await;
            sessions.store("persisted".to_string(), t0()).await;
        }

        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::with_path(path).await.unwrap());
        let later = t0() + chrono::Duration::hours(2);
        let sessions = SessionStore::load(store, DAY, later).await;
        assert_eq!(sessions.read(later).as_deref(), Some("persisted"));
    }

    #[tokio::test]
    async fn test_reload_clears_stale_session() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store
            .apply(
                StoreEdit::new()
                    .put(keys::SESSION_TOKEN, "old")
                    .put(keys::LAST_AUTH_TIME, to_millis(t0())),
            )
            .await
            .unwrap();

        let later = t0() + chrono::Duration::hours(25);
        let sessions = SessionStore::load(store.clone(), DAY, later).await;
        assert!(sessions.session().is_none());
        assert!(store.get(keys::SESSION_TOKEN).await.is_none());
    }

    #[tokio::test]
    async fn test_token_without_timestamp_is_discarded() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store
            .apply(StoreEdit::new().put(keys::SESSION_TOKEN, "orphan"))
            .await
            .unwrap();

        let sessions = SessionStore::load(store.clone(), DAY, t0()).await;
        assert!(!sessions.is_valid(t0()));
        assert!(store.get(keys::SESSION_TOKEN).await.is_none());
    }

    #[tokio::test]
    async fn test_store_after_poisoned_lock() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let sessions = SessionStore::load(store.clone(), DAY, t0()).await;
        sessions.store("old".to_string(), t0()).await;

        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = sessions.current.write().unwrap();
            panic!("writer panicked while holding the session lock");
        }));
        assert!(sessions.current.is_poisoned());

        sessions.store("fresh".to_string(), t0()).await;
        assert_eq!(sessions.read(t0()).as_deref(), Some("fresh"));
        assert_eq!(
            store.get_string(keys::SESSION_TOKEN).await.as_deref(),
            Some("fresh")
        );

        sessions.clear().await;
        assert_eq!(sessions.read(t0()), None);
    }

    #[test]
    fn test_debug_hides_token() {
        let session = Session {
            token: "secret-token".to_string(),
            issued_at: t0(),
        };
        assert!(!format!("{:?}", session).contains("secret-token"));
    }
}
