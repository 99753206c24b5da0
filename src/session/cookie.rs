//! Edge-visible cookies.
//!
//! The access token is mirrored into `his_access_token` so the gate, which
//! cannot see persistent storage, can tell whether someone is signed in.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use cookie::time::Duration;
use cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

use super::storage::{PersistentStorage, StorageError};

pub const ACCESS_TOKEN_COOKIE: &str = "his_access_token";

/// Owned by the login / password-change flow; only ever read here
pub const FORCE_PASSWORD_CHANGE_COOKIE: &str = "his_force_password_change";

const GATE_COOKIES: &[&str] = &[ACCESS_TOKEN_COOKIE, FORCE_PASSWORD_CHANGE_COOKIE];

/// `his_access_token=<url-encoded token>; Path=/; Max-Age=..; SameSite=Lax`
pub fn access_token_cookie(token: &str, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, urlencoding::encode(token).into_owned()))
        .path("/")
        .max_age(Duration::seconds(max_age_secs))
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Expires the access token cookie immediately
pub fn expired_access_token_cookie(secure: bool) -> Cookie<'static> {
    access_token_cookie("", 0, secure)
}

/// The flag as the backend sets it at login. A cleared flag is a removal.
///
/// `SessionStore` never writes this cookie; this is for clients that have to
/// apply the backend's `Set-Cookie` themselves.
pub fn force_password_change_cookie(
    forced: bool,
    max_age_secs: i64,
    secure: bool,
) -> Cookie<'static> {
    let max_age = if forced { max_age_secs } else { 0 };
    Cookie::build((FORCE_PASSWORD_CHANGE_COOKIE, "1"))
        .path("/")
        .max_age(Duration::seconds(max_age))
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Value of `name` in a `Cookie` request header, as sent (still encoded)
pub fn read_cookie(header: &str, name: &str) -> Option<String> {
    Cookie::split_parse(header)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

pub fn decode_value(raw: &str) -> Option<String> {
    urlencoding::decode(raw).ok().map(|v| v.into_owned())
}

fn is_removal(cookie: &Cookie<'_>) -> bool {
    matches!(cookie.max_age(), Some(age) if age <= Duration::ZERO)
}

/// Client-side cookie jar, the `document.cookie` half of a session
pub trait CookieStore: Send + Sync {
    /// Apply a `Set-Cookie`. A non-positive max-age deletes the cookie.
    fn set_cookie(&self, cookie: Cookie<'static>) -> Result<(), StorageError>;

    /// Raw value of a live cookie
    fn get_cookie(&self, name: &str) -> Option<String>;
}

/// `Cookie` request header carrying the cookies the gate reads
pub fn request_header(store: &dyn CookieStore) -> String {
    GATE_COOKIES
        .iter()
        .filter_map(|name| store.get_cookie(name).map(|v| format!("{}={}", name, v)))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    jar: Mutex<CookieJar>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieStore for MemoryCookieJar {
    fn set_cookie(&self, cookie: Cookie<'static>) -> Result<(), StorageError> {
        let mut jar = self.jar.lock().map_err(|_| StorageError::Poisoned)?;
        if is_removal(&cookie) {
            jar.remove(Cookie::new(cookie.name().to_string(), ""));
        } else {
            jar.add(cookie);
        }
        Ok(())
    }

    fn get_cookie(&self, name: &str) -> Option<String> {
        let jar = self.jar.lock().ok()?;
        jar.get(name).map(|c| c.value().to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCookie {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

/// Cookie jar persisted through a `PersistentStorage`, honouring max-age
/// across process restarts
pub struct StorageCookieJar {
    storage: Arc<dyn PersistentStorage>,
    prefix: String,
}

impl StorageCookieJar {
    pub fn new(storage: Arc<dyn PersistentStorage>, namespace: &str) -> Self {
        Self {
            storage,
            prefix: format!("{}:cookie:", namespace),
        }
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

impl CookieStore for StorageCookieJar {
    fn set_cookie(&self, cookie: Cookie<'static>) -> Result<(), StorageError> {
        let key = self.key(cookie.name());
        if is_removal(&cookie) {
            return self.storage.remove_item(&key);
        }
        let expires_at = cookie
            .max_age()
            .map(|age| Utc::now() + chrono::Duration::seconds(age.whole_seconds()));
        let stored = StoredCookie {
            value: cookie.value().to_string(),
            expires_at,
        };
        self.storage.set_item(&key, &serde_json::to_string(&stored)?)
    }

    fn get_cookie(&self, name: &str) -> Option<String> {
        let raw = match self.storage.get_item(&self.key(name)) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Failed to read cookie '{}': {}", name, e);
                return None;
            }
        };
        let stored: StoredCookie = serde_json::from_str(&raw).ok()?;
        match stored.expires_at {
            Some(expires_at) if expires_at <= Utc::now() => None,
            _ => Some(stored.value),
        }
    }
}
