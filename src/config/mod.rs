use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub session: SessionConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Origin that `/api`, `/oauth2` and `/login/oauth2` are forwarded to
    pub origin: String,
    /// Object-storage origin for uploaded files
    pub storage_origin: String,
    pub storage_prefixes: Vec<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub cookie_max_age_secs: i64,
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub secure_cookies: bool,
}

const SESSION_COOKIE_MAX_AGE_SECS: i64 = 60 * 60 * 12;

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("HIS_HOST") {
            self.server.host = v;
        }
        if let Some(v) = env::var("HIS_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Backend overrides
        if let Ok(v) = env::var("HIS_BACKEND_ORIGIN") {
            self.backend.origin = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("HIS_STORAGE_ORIGIN") {
            self.backend.storage_origin = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("HIS_STORAGE_PREFIXES") {
            self.backend.storage_prefixes = split_list(&v);
        }
        if let Ok(v) = env::var("HIS_BACKEND_TIMEOUT_SECS") {
            self.backend.request_timeout_secs =
                v.parse().unwrap_or(self.backend.request_timeout_secs);
        }

        // Session overrides
        if let Ok(v) = env::var("HIS_SESSION_COOKIE_MAX_AGE_SECS") {
            self.session.cookie_max_age_secs =
                v.parse().unwrap_or(self.session.cookie_max_age_secs);
        }
        if let Ok(v) = env::var("HIS_SESSION_NAMESPACE") {
            if !v.trim().is_empty() {
                self.session.namespace = v.trim().to_string();
            }
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }
        if let Ok(v) = env::var("SECURITY_SECURE_COOKIES") {
            self.security.secure_cookies = v.parse().unwrap_or(self.security.secure_cookies);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            backend: BackendConfig {
                origin: "http://localhost:8080".to_string(),
                storage_origin: "http://localhost:9000".to_string(),
                storage_prefixes: default_storage_prefixes(),
                request_timeout_secs: 30,
            },
            session: SessionConfig {
                cookie_max_age_secs: SESSION_COOKIE_MAX_AGE_SECS,
                namespace: "his".to_string(),
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string()],
                secure_cookies: false,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            backend: BackendConfig {
                origin: "http://his-backend.staging.internal:8080".to_string(),
                storage_origin: "http://his-storage.staging.internal:9000".to_string(),
                storage_prefixes: default_storage_prefixes(),
                request_timeout_secs: 15,
            },
            session: SessionConfig {
                cookie_max_age_secs: SESSION_COOKIE_MAX_AGE_SECS,
                namespace: "his".to_string(),
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://his.staging.example.com".to_string()],
                secure_cookies: true,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            backend: BackendConfig {
                origin: "http://his-backend.internal:8080".to_string(),
                storage_origin: "http://his-storage.internal:9000".to_string(),
                storage_prefixes: default_storage_prefixes(),
                request_timeout_secs: 10,
            },
            session: SessionConfig {
                cookie_max_age_secs: SESSION_COOKIE_MAX_AGE_SECS,
                namespace: "his".to_string(),
            },
            security: SecurityConfig {
                enable_cors: false,
                cors_origins: vec!["https://his.example.com".to_string()],
                secure_cookies: true,
            },
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn default_storage_prefixes() -> Vec<String> {
    vec!["/uploads".to_string(), "/files".to_string(), "/images".to_string()]
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
