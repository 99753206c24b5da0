//! REST client layer.
//!
//! One `ApiClient` per backend domain. Every request carries the session's
//! bearer token when there is one, and every response is unwrapped from the
//! `{ success, result, message }` envelope into either a value or a
//! `ClientError` whose message is ready for display.

pub mod auth;
pub mod codes;
pub mod medical;
pub mod patients;
pub mod reception;
pub mod staff;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::config::AppConfig;
use crate::envelope::Envelope;
use crate::session::SessionStore;

pub use auth::AuthApi;
pub use codes::CodesApi;
pub use medical::MedicalApi;
pub use patients::PatientsApi;
pub use reception::ReceptionApi;
pub use staff::StaffApi;

/// Supplies the bearer token and hears about rejected credentials
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Option<String>;

    /// Called when the backend answers 401
    fn on_unauthorized(&self) {}
}

impl TokenSource for SessionStore {
    fn access_token(&self) -> Option<String> {
        self.get_access_token()
    }

    fn on_unauthorized(&self) {
        tracing::info!("Backend rejected the access token, clearing session");
        self.clear_session();
    }
}

/// Fixed token, for scripts and tests
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl TokenSource for StaticToken {
    fn access_token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Auth,
    Patients,
    Reception,
    Staff,
    Medical,
    Codes,
}

impl Domain {
    pub fn base_path(self) -> &'static str {
        match self {
            Domain::Auth => "/api/auth",
            Domain::Patients => "/api/patients",
            Domain::Reception => "/api/reception",
            Domain::Staff => "/api/staff",
            Domain::Medical => "/api/medical",
            Domain::Codes => "/api/codes",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_path().trim_start_matches("/api/"))
    }
}

/// Every failure a call site can see. `Display` is the user-facing message.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{message}")]
    Network {
        message: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("{message}")]
    Unauthorized { message: String },

    /// `success: false`
    #[error("{message}")]
    Rejected { message: String },

    /// `success: true` without the value this call needs
    #[error("{message}")]
    MissingResult { message: String },

    #[error("{message}")]
    Decode {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized { .. })
    }
}

fn pick_message(backend: Option<&str>, default_message: &str) -> String {
    backend.unwrap_or(default_message).to_string()
}

impl<T> Envelope<T> {
    /// The value, or `MissingResult` when the backend sent none
    pub fn require(self, default_message: &str) -> Result<T, ClientError> {
        let message = pick_message(self.message(), default_message);
        self.result.ok_or(ClientError::MissingResult { message })
    }

    /// The value, treating an absent result as empty
    pub fn or_empty(self) -> T
    where
        T: Default,
    {
        self.result.unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    origin: Url,
    domain: Domain,
    tokens: Arc<dyn TokenSource>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("origin", &self.origin.as_str())
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        origin: &str,
        domain: Domain,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http,
            origin: Url::parse(origin)?,
            domain,
            tokens,
        })
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.origin.join(&format!("{}{}", self.domain.base_path(), path))?)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        default_message: &str,
    ) -> Result<Envelope<T>, ClientError> {
        let request = self.request(Method::GET, path)?.query(query);
        self.send(request, default_message).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        default_message: &str,
    ) -> Result<Envelope<T>, ClientError> {
        let request = self.request(Method::POST, path)?.json(body);
        self.send(request, default_message).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        default_message: &str,
    ) -> Result<Envelope<T>, ClientError> {
        let request = self.request(Method::PUT, path)?.json(body);
        self.send(request, default_message).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        default_message: &str,
    ) -> Result<Envelope<T>, ClientError> {
        let request = self.request(Method::DELETE, path)?;
        self.send(request, default_message).await
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self.url(path)?;
        let mut request = self.http.request(method, url);
        if let Some(token) = self.tokens.access_token() {
            request = request.bearer_auth(token);
        }
        Ok(request)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        default_message: &str,
    ) -> Result<Envelope<T>, ClientError> {
        let network = |source: reqwest::Error| ClientError::Network {
            message: default_message.to_string(),
            source,
        };

        let response = request.send().await.map_err(network)?;
        let status = response.status();
        let body = response.bytes().await.map_err(network)?;

        // Error bodies are read loosely; only a successful body must match `T`
        let parsed: Result<Envelope<serde_json::Value>, serde_json::Error> =
            serde_json::from_slice(&body);
        let backend_message = parsed
            .as_ref()
            .ok()
            .and_then(|e| e.message())
            .map(str::to_string);

        if status == StatusCode::UNAUTHORIZED {
            self.tokens.on_unauthorized();
            return Err(ClientError::Unauthorized {
                message: pick_message(backend_message.as_deref(), default_message),
            });
        }

        if !status.is_success() {
            tracing::warn!("{} request failed with status {}", self.domain, status);
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: pick_message(backend_message.as_deref(), default_message),
            });
        }

        let envelope = parsed.map_err(|source| ClientError::Decode {
            message: default_message.to_string(),
            source,
        })?;

        if !envelope.success {
            return Err(ClientError::Rejected {
                message: pick_message(backend_message.as_deref(), default_message),
            });
        }

        let result = match envelope.result {
            Some(serde_json::Value::Null) | None => None,
            Some(value) => Some(serde_json::from_value(value).map_err(|source| ClientError::Decode {
                message: default_message.to_string(),
                source,
            })?),
        };

        Ok(Envelope {
            success: true,
            result,
            message: envelope.message,
        })
    }
}

/// All domain clients sharing one HTTP connection pool and token source
#[derive(Debug, Clone)]
pub struct HisApi {
    pub auth: AuthApi,
    pub patients: PatientsApi,
    pub reception: ReceptionApi,
    pub staff: StaffApi,
    pub medical: MedicalApi,
    pub codes: CodesApi,
}

impl HisApi {
    pub fn new(
        http: reqwest::Client,
        origin: &str,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, ClientError> {
        let client = |domain| ApiClient::new(http.clone(), origin, domain, tokens.clone());
        Ok(Self {
            auth: AuthApi::new(client(Domain::Auth)?),
            patients: PatientsApi::new(client(Domain::Patients)?),
            reception: ReceptionApi::new(client(Domain::Reception)?),
            staff: StaffApi::new(client(Domain::Staff)?),
            medical: MedicalApi::new(client(Domain::Medical)?),
            codes: CodesApi::new(client(Domain::Codes)?),
        })
    }

    pub fn from_config(
        config: &AppConfig,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.backend.request_timeout_secs))
            .build()
            .map_err(|source| ClientError::Network {
                message: "HTTP 클라이언트를 초기화하지 못했습니다.".to_string(),
                source,
            })?;
        Self::new(http, &config.backend.origin, tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_prefers_backend_message() {
        let env: Envelope<u8> = Envelope {
            success: true,
            result: None,
            message: Some("등록된 환자가 없습니다".to_string()),
        };
        assert_eq!(
            env.require("기본 메시지").unwrap_err().message(),
            "등록된 환자가 없습니다"
        );

        let env: Envelope<u8> = Envelope { success: true, result: None, message: None };
        assert_eq!(env.require("기본 메시지").unwrap_err().message(), "기본 메시지");
    }

    #[test]
    fn or_empty_defaults_missing_lists() {
        let env: Envelope<Vec<u8>> = Envelope { success: true, result: None, message: None };
        assert!(env.or_empty().is_empty());
    }

    #[test]
    fn urls_are_rooted_at_domain_base() {
        let client = ApiClient::new(
            reqwest::Client::new(),
            "http://backend.local:8080",
            Domain::Patients,
            Arc::new(StaticToken::default()),
        )
        .unwrap();
        assert_eq!(
            client.url("/42").unwrap().as_str(),
            "http://backend.local:8080/api/patients/42"
        );
        assert_eq!(client.url("").unwrap().as_str(), "http://backend.local:8080/api/patients");
    }

    #[test]
    fn domain_display_is_short_name() {
        assert_eq!(Domain::Reception.to_string(), "reception");
    }
}
