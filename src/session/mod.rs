//! Session store.
//!
//! One place that knows whether somebody is signed in. A session lives in two
//! places at once: the token and user profile in persistent storage for the
//! client runtime, and the token alone in the `his_access_token` cookie for
//! the gate. Every read and write goes through `SessionStore` so the two never
//! disagree.

pub mod cookie;
pub mod storage;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::access::Role;
use crate::config::AppConfig;
use self::cookie::{
    access_token_cookie, decode_value, expired_access_token_cookie, request_header, CookieStore,
    ACCESS_TOKEN_COOKIE,
};
use self::storage::{PersistentStorage, StorageError};

const DEFAULT_NAMESPACE: &str = "his";
const DEFAULT_COOKIE_MAX_AGE_SECS: i64 = 60 * 60 * 12;
const EVENT_CAPACITY: usize = 16;

/// Lightweight profile kept next to the token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role: String,
}

impl SessionUser {
    pub fn normalized_role(&self) -> Role {
        Role::normalize(&self.role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
}

/// Published to every handle sharing a store when the session changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Saved { username: String },
    Cleared,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage is not available in this context")]
    Unavailable,

    #[error("access token must not be empty")]
    EmptyToken,

    #[error("failed to serialize session user: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Prefix for persistent storage keys
    pub namespace: String,
    pub cookie_max_age_secs: i64,
    pub secure_cookie: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            cookie_max_age_secs: DEFAULT_COOKIE_MAX_AGE_SECS,
            secure_cookie: false,
        }
    }
}

impl From<&AppConfig> for SessionOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            namespace: config.session.namespace.clone(),
            cookie_max_age_secs: config.session.cookie_max_age_secs,
            secure_cookie: config.security.secure_cookies,
        }
    }
}

type Availability = Arc<dyn Fn() -> bool + Send + Sync>;

/// Cloning shares storage, cookies and the change channel
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn PersistentStorage>,
    cookies: Arc<dyn CookieStore>,
    available: Availability,
    options: SessionOptions,
    events: broadcast::Sender<SessionEvent>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("options", &self.options)
            .field("available", &(self.available)())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(storage: Arc<dyn PersistentStorage>, cookies: Arc<dyn CookieStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            storage,
            cookies,
            available: Arc::new(|| true),
            options: SessionOptions::default(),
            events,
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Inject the "is storage reachable here" capability check
    pub fn with_availability(
        mut self,
        available: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        self.available = Arc::new(available);
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    fn token_key(&self) -> String {
        format!("{}:accessToken", self.options.namespace)
    }

    fn user_key(&self) -> String {
        format!("{}:user", self.options.namespace)
    }

    fn is_available(&self) -> bool {
        (self.available)()
    }

    /// Write token and profile to storage, then mirror the token into the
    /// edge cookie. Either everything is written or the previous session is
    /// put back; if even that fails, both sides end up signed out.
    pub fn save_session(&self, token: &str, user: &SessionUser) -> Result<(), SessionError> {
        if !self.is_available() {
            return Err(SessionError::Unavailable);
        }
        if token.is_empty() {
            return Err(SessionError::EmptyToken);
        }

        let profile = serde_json::to_string(user)?;
        let token_key = self.token_key();
        let user_key = self.user_key();
        let previous = [
            (token_key.clone(), self.storage.get_item(&token_key)?),
            (user_key.clone(), self.storage.get_item(&user_key)?),
        ];

        if let Err(e) = self.write_session(&token_key, &user_key, token, &profile) {
            self.restore(&previous);
            return Err(e);
        }

        tracing::debug!("Session saved for user '{}'", user.username);
        let _ = self.events.send(SessionEvent::Saved {
            username: user.username.clone(),
        });
        Ok(())
    }

    fn write_session(
        &self,
        token_key: &str,
        user_key: &str,
        token: &str,
        profile: &str,
    ) -> Result<(), SessionError> {
        self.storage.set_item(token_key, token)?;
        self.storage.set_item(user_key, profile)?;

        // Last, so a failure anywhere above leaves the previous cookie in place
        let cookie = access_token_cookie(
            token,
            self.options.cookie_max_age_secs,
            self.options.secure_cookie,
        );
        self.cookies.set_cookie(cookie)?;
        Ok(())
    }

    /// Put back the storage entries captured before a failed save. The edge
    /// cookie still holds the previous token at this point.
    fn restore(&self, previous: &[(String, Option<String>)]) {
        let mut restored = true;
        for (key, value) in previous {
            let result = match value {
                Some(value) => self.storage.set_item(key, value),
                None => self.storage.remove_item(key),
            };
            if let Err(e) = result {
                tracing::error!("Failed to restore session key '{}': {}", key, e);
                restored = false;
            }
        }

        if !restored {
            tracing::warn!("Previous session could not be restored, signing out");
            for (key, _) in previous {
                if let Err(e) = self.storage.remove_item(key) {
                    tracing::error!("Failed to remove session key '{}': {}", key, e);
                }
            }
            self.expire_cookie();
        }
    }

    fn expire_cookie(&self) {
        let cookie = expired_access_token_cookie(self.options.secure_cookie);
        if let Err(e) = self.cookies.set_cookie(cookie) {
            tracing::error!("Failed to expire access token cookie: {}", e);
        }
    }

    /// `None` when signed out, when storage is unreachable, or on read failure
    pub fn get_access_token(&self) -> Option<String> {
        if !self.is_available() {
            return None;
        }
        match self.storage.get_item(&self.token_key()) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!("Failed to read access token: {}", e);
                None
            }
        }
    }

    /// `None` on any read or parse failure
    pub fn get_session_user(&self) -> Option<SessionUser> {
        if !self.is_available() {
            return None;
        }
        let raw = match self.storage.get_item(&self.user_key()) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Failed to read session user: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("Discarding unreadable session user: {}", e);
                None
            }
        }
    }

    pub fn get_session(&self) -> Option<Session> {
        Some(Session {
            token: self.get_access_token()?,
            user: self.get_session_user()?,
        })
    }

    /// Remove both storage entries and expire the edge cookie. Each step is
    /// attempted even if an earlier one fails.
    pub fn clear_session(&self) {
        if !self.is_available() {
            return;
        }
        for key in [self.token_key(), self.user_key()] {
            if let Err(e) = self.storage.remove_item(&key) {
                tracing::error!("Failed to remove session key '{}': {}", key, e);
            }
        }
        self.expire_cookie();

        tracing::debug!("Session cleared");
        let _ = self.events.send(SessionEvent::Cleared);
    }

    /// Token as the gate would see it, URL-decoded
    pub fn edge_token(&self) -> Option<String> {
        if !self.is_available() {
            return None;
        }
        self.cookies
            .get_cookie(ACCESS_TOKEN_COOKIE)
            .and_then(|raw| decode_value(&raw))
            .filter(|t| !t.is_empty())
    }

    /// The runtime and the gate agree on who is signed in
    pub fn is_consistent(&self) -> bool {
        self.get_access_token() == self.edge_token()
    }

    /// `Cookie` header the gate would receive from this client
    pub fn cookie_header(&self) -> String {
        request_header(self.cookies.as_ref())
    }

    /// Observe saves and clears made through any clone of this store
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::cookie::{MemoryCookieJar, FORCE_PASSWORD_CHANGE_COOKIE};
    use crate::session::storage::MemoryStorage;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn user() -> SessionUser {
        SessionUser {
            id: "42".to_string(),
            username: "nurse.kim".to_string(),
            display_name: "김간호".to_string(),
            role: "간호사".to_string(),
        }
    }

    fn store() -> (SessionStore, Arc<MemoryStorage>, Arc<MemoryCookieJar>) {
        let storage = Arc::new(MemoryStorage::new());
        let cookies = Arc::new(MemoryCookieJar::new());
        (SessionStore::new(storage.clone(), cookies.clone()), storage, cookies)
    }

    /// Storage that accepts the first `n` writes and then fails
    struct FlakyStorage {
        inner: MemoryStorage,
        remaining: std::sync::Mutex<usize>,
    }

    impl PersistentStorage for FlakyStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
            let mut remaining = self.remaining.lock().unwrap();
            if *remaining == 0 {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "quota exceeded",
                )));
            }
            *remaining -= 1;
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove_item(key)
        }
    }

    fn flaky_store(writes: usize) -> SessionStore {
        let storage = Arc::new(FlakyStorage {
            inner: MemoryStorage::new(),
            remaining: std::sync::Mutex::new(writes),
        });
        SessionStore::new(storage, Arc::new(MemoryCookieJar::new()))
    }

    /// Storage whose next write to `key` fails once armed
    struct FailOnceStorage {
        inner: MemoryStorage,
        key: &'static str,
        armed: AtomicBool,
    }

    impl PersistentStorage for FailOnceStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == self.key && self.armed.swap(false, Ordering::SeqCst) {
                return Err(StorageError::Poisoned);
            }
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove_item(key)
        }
    }

    /// Cookie jar that rejects writes while armed
    #[derive(Default)]
    struct FailingCookies {
        inner: MemoryCookieJar,
        armed: AtomicBool,
    }

    impl CookieStore for FailingCookies {
        fn set_cookie(&self, cookie: ::cookie::Cookie<'static>) -> Result<(), StorageError> {
            if self.armed.load(Ordering::SeqCst) {
                return Err(StorageError::Poisoned);
            }
            self.inner.set_cookie(cookie)
        }

        fn get_cookie(&self, name: &str) -> Option<String> {
            self.inner.get_cookie(name)
        }
    }

    fn other_user() -> SessionUser {
        SessionUser {
            id: "43".to_string(),
            username: "dr.park".to_string(),
            display_name: "박의사".to_string(),
            role: "DOCTOR".to_string(),
        }
    }

    #[test]
    fn save_then_read_returns_token_and_sets_cookie() {
        let (store, _, cookies) = store();
        store.save_session("tok/with space", &user()).unwrap();

        assert_eq!(store.get_access_token().as_deref(), Some("tok/with space"));
        assert_eq!(store.edge_token().as_deref(), Some("tok/with space"));
        assert_eq!(
            cookies.get_cookie(ACCESS_TOKEN_COOKIE).as_deref(),
            Some("tok%2Fwith%20space")
        );
        assert_eq!(store.get_session_user(), Some(user()));
        assert!(store.is_consistent());
    }

    #[test]
    fn clear_leaves_token_and_cookie_absent() {
        let (store, _, _) = store();
        store.save_session("tok", &user()).unwrap();
        store.clear_session();

        assert_eq!(store.get_access_token(), None);
        assert_eq!(store.edge_token(), None);
        assert_eq!(store.get_session_user(), None);
        assert!(store.is_consistent());
    }

    #[test]
    fn clear_does_not_touch_force_flag_cookie() {
        let (store, _, cookies) = store();
        cookies
            .set_cookie(::cookie::Cookie::new(FORCE_PASSWORD_CHANGE_COOKIE, "1"))
            .unwrap();
        store.save_session("tok", &user()).unwrap();
        store.clear_session();
        assert_eq!(cookies.get_cookie(FORCE_PASSWORD_CHANGE_COOKIE).as_deref(), Some("1"));
    }

    #[test]
    fn unavailable_storage_reads_as_signed_out() {
        let (store, storage, _) = store();
        storage.set_item("his:accessToken", "tok").unwrap();
        let store = store.with_availability(|| false);

        assert_eq!(store.get_access_token(), None);
        assert_eq!(store.get_session_user(), None);
        assert!(matches!(store.save_session("tok", &user()), Err(SessionError::Unavailable)));
        store.clear_session();
        assert_eq!(storage.get_item("his:accessToken").unwrap().as_deref(), Some("tok"));
    }

    #[test]
    fn availability_is_evaluated_per_call() {
        let flag = Arc::new(AtomicBool::new(false));
        let probe = flag.clone();
        let (store, _, _) = store();
        let store = store.with_availability(move || probe.load(Ordering::SeqCst));

        assert!(store.save_session("tok", &user()).is_err());
        flag.store(true, Ordering::SeqCst);
        store.save_session("tok", &user()).unwrap();
        assert_eq!(store.get_access_token().as_deref(), Some("tok"));
    }

    #[test]
    fn corrupt_profile_reads_as_absent() {
        let (store, storage, _) = store();
        storage.set_item("his:user", "{\"id\":").unwrap();
        assert_eq!(store.get_session_user(), None);
        assert_eq!(store.get_session(), None);
    }

    #[test]
    fn numeric_user_id_is_accepted() {
        let user: SessionUser = serde_json::from_str(
            r#"{"id":7,"username":"dr.lee","displayName":"이의사","role":"DOCTOR"}"#,
        )
        .unwrap();
        assert_eq!(user.id, "7");
        assert_eq!(user.normalized_role(), Role::Doctor);
    }

    #[test]
    fn failed_profile_write_rolls_back_token() {
        let store = flaky_store(1);

        assert!(store.save_session("tok", &user()).is_err());
        assert_eq!(store.get_access_token(), None);
        assert_eq!(store.edge_token(), None);
        assert!(store.is_consistent());
    }

    #[test]
    fn failed_overwrite_keeps_previous_session() {
        let storage = Arc::new(FailOnceStorage {
            inner: MemoryStorage::new(),
            key: "his:user",
            armed: AtomicBool::new(false),
        });
        let store = SessionStore::new(storage.clone(), Arc::new(MemoryCookieJar::new()));
        store.save_session("tok-A", &user()).unwrap();

        storage.armed.store(true, Ordering::SeqCst);
        assert!(store.save_session("tok-B", &other_user()).is_err());

        assert_eq!(store.get_access_token().as_deref(), Some("tok-A"));
        assert_eq!(store.edge_token().as_deref(), Some("tok-A"));
        assert_eq!(store.get_session_user(), Some(user()));
        assert!(store.is_consistent());
    }

    #[test]
    fn unrestorable_overwrite_signs_out_both_sides() {
        // Token and profile of A, then the token of B; every later write fails
        let store = flaky_store(3);
        store.save_session("tok-A", &user()).unwrap();

        assert!(store.save_session("tok-B", &other_user()).is_err());

        assert_eq!(store.get_access_token(), None);
        assert_eq!(store.get_session_user(), None);
        assert_eq!(store.edge_token(), None);
        assert!(store.is_consistent());
    }

    #[test]
    fn failed_cookie_write_from_signed_out_leaves_nothing() {
        let cookies = Arc::new(FailingCookies::default());
        cookies.armed.store(true, Ordering::SeqCst);
        let store = SessionStore::new(Arc::new(MemoryStorage::new()), cookies);

        assert!(matches!(
            store.save_session("tok", &user()),
            Err(SessionError::Storage(StorageError::Poisoned))
        ));
        assert_eq!(store.get_access_token(), None);
        assert_eq!(store.get_session_user(), None);
        assert_eq!(store.edge_token(), None);
        assert!(store.is_consistent());
    }

    #[test]
    fn failed_cookie_write_over_existing_session_keeps_it() {
        let cookies = Arc::new(FailingCookies::default());
        let store = SessionStore::new(Arc::new(MemoryStorage::new()), cookies.clone());
        store.save_session("tok-A", &user()).unwrap();

        cookies.armed.store(true, Ordering::SeqCst);
        assert!(store.save_session("tok-B", &other_user()).is_err());

        assert_eq!(store.get_access_token().as_deref(), Some("tok-A"));
        assert_eq!(store.edge_token().as_deref(), Some("tok-A"));
        assert_eq!(store.get_session_user(), Some(user()));
        assert!(store.is_consistent());
    }

    #[test]
    fn empty_token_is_rejected() {
        let (store, _, _) = store();
        assert!(matches!(store.save_session("", &user()), Err(SessionError::EmptyToken)));
        assert_eq!(store.edge_token(), None);
    }

    #[test]
    fn namespace_prefixes_storage_keys() {
        let (store, storage, _) = store();
        let store = store.with_options(SessionOptions {
            namespace: "his-dev".to_string(),
            ..SessionOptions::default()
        });
        store.save_session("tok", &user()).unwrap();
        assert_eq!(storage.get_item("his-dev:accessToken").unwrap().as_deref(), Some("tok"));
        assert!(storage.get_item("his-dev:user").unwrap().is_some());
    }

    #[tokio::test]
    async fn clones_observe_each_others_changes() {
        let (store, _, _) = store();
        let other_tab = store.clone();
        let mut events = other_tab.subscribe();

        store.save_session("tok", &user()).unwrap();
        store.clear_session();

        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Saved { username: "nurse.kim".to_string() }
        );
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Cleared);
        assert_eq!(other_tab.get_access_token(), None);
    }
}
