use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::config;
use crate::session::cookie::{force_password_change_cookie, CookieStore, StorageCookieJar};
use crate::session::storage::{FileStorage, PersistentStorage};
use crate::session::{SessionOptions, SessionStore};

const SESSION_FILE: &str = "session.json";
const COOKIE_FILE: &str = "cookies.json";

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("HIS_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME")
            .map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("his").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

fn cookie_jar_in(dir: &Path, options: &SessionOptions) -> StorageCookieJar {
    let storage: Arc<dyn PersistentStorage> = Arc::new(FileStorage::new(dir.join(COOKIE_FILE)));
    StorageCookieJar::new(storage, &options.namespace)
}

/// The CLI's stand-in for a browser tab: profile storage plus a cookie jar,
/// both persisted under `dir`
pub fn session_store_in(dir: &Path) -> SessionStore {
    let storage: Arc<dyn PersistentStorage> = Arc::new(FileStorage::new(dir.join(SESSION_FILE)));
    let options = SessionOptions::from(config());
    let cookies = Arc::new(cookie_jar_in(dir, &options));

    // Storage is only usable while the directory is there
    let probe = dir.to_path_buf();
    SessionStore::new(storage, cookies)
        .with_options(options)
        .with_availability(move || probe.is_dir())
}

pub fn session_store() -> anyhow::Result<SessionStore> {
    Ok(session_store_in(&get_config_dir()?))
}

/// Apply the force-password-change flag from a login response to the jar,
/// as a browser would apply the backend's `Set-Cookie`
pub fn record_force_password_change(dir: &Path, forced: bool) -> anyhow::Result<()> {
    let options = SessionOptions::from(config());
    let cookie =
        force_password_change_cookie(forced, options.cookie_max_age_secs, options.secure_cookie);
    cookie_jar_in(dir, &options).set_cookie(cookie)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{self, GateRequest};
    use crate::session::SessionUser;

    fn reception_user() -> SessionUser {
        SessionUser {
            id: "1".to_string(),
            username: "reception01".to_string(),
            display_name: "원무 담당".to_string(),
            role: "RECEPTION".to_string(),
        }
    }

    fn gate_with_session(dir: &Path, path: &str) -> gate::GateDecision {
        let header = session_store_in(dir).cookie_header();
        gate::decide(&GateRequest::from_cookie_header(path, Some(header.as_str())))
    }

    #[test]
    fn session_survives_reopening_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let user = reception_user();

        session_store_in(dir.path()).save_session("tok", &user).unwrap();

        let reopened = session_store_in(dir.path());
        assert_eq!(reopened.get_access_token().as_deref(), Some("tok"));
        assert_eq!(reopened.edge_token().as_deref(), Some("tok"));
        assert_eq!(reopened.get_session_user(), Some(user));

        reopened.clear_session();
        assert_eq!(session_store_in(dir.path()).edge_token(), None);
    }

    #[test]
    fn missing_directory_reads_as_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("removed");
        let store = session_store_in(&gone);
        assert_eq!(store.get_access_token(), None);
        assert!(store.save_session("tok", &reception_user()).is_err());
    }

    #[test]
    fn recorded_force_flag_pins_session_to_account_page() {
        let dir = tempfile::tempdir().unwrap();
        session_store_in(dir.path()).save_session("tok", &reception_user()).unwrap();
        record_force_password_change(dir.path(), true).unwrap();

        assert_eq!(
            gate_with_session(dir.path(), "/reception").location().as_deref(),
            Some("/my_account?forcePasswordChange=1")
        );
        assert!(gate_with_session(dir.path(), "/my_account").is_pass());
    }

    #[test]
    fn cleared_force_flag_lets_session_through() {
        let dir = tempfile::tempdir().unwrap();
        session_store_in(dir.path()).save_session("tok", &reception_user()).unwrap();
        record_force_password_change(dir.path(), true).unwrap();
        record_force_password_change(dir.path(), false).unwrap();

        assert!(gate_with_session(dir.path(), "/reception").is_pass());
    }

    #[test]
    fn logout_keeps_backend_owned_flag() {
        let dir = tempfile::tempdir().unwrap();
        let store = session_store_in(dir.path());
        store.save_session("tok", &reception_user()).unwrap();
        record_force_password_change(dir.path(), true).unwrap();
        store.clear_session();

        // Signed out: the gate sends the user to login regardless of the flag
        assert_eq!(
            gate_with_session(dir.path(), "/reception").location().as_deref(),
            Some("/login?next=%2Freception")
        );
        assert!(store.cookie_header().contains("his_force_password_change=1"));
    }
}
