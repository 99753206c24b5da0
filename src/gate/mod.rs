//! Route gate.
//!
//! Decides, before any page renders, whether a navigation passes through or
//! is redirected. The decision depends only on the path and two cookies, so
//! it is a pure synchronous function; the axum glue lives in
//! `middleware::gate`.

pub mod routes;

use url::Url;

use crate::session::cookie::{read_cookie, ACCESS_TOKEN_COOKIE, FORCE_PASSWORD_CHANGE_COOKIE};
pub use routes::{classify, RouteClass};

pub const LOGIN_PATH: &str = "/login";
pub const ACCOUNT_PATH: &str = "/my_account";
pub const ROOT_PATH: &str = "/";

pub const NEXT_PARAM: &str = "next";
pub const FORCE_PASSWORD_CHANGE_PARAM: &str = "forcePasswordChange";

/// Cookie value that turns the force-password-change flag on
pub const FORCE_FLAG_ON: &str = "1";

/// Request state the gate looks at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateRequest {
    pub path: String,
    pub access_token: Option<String>,
    pub force_password_change: Option<String>,
}

impl GateRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_force_password_change(mut self, value: impl Into<String>) -> Self {
        self.force_password_change = Some(value.into());
        self
    }

    /// Build from a raw `Cookie` request header. Malformed pairs are skipped.
    pub fn from_cookie_header(path: impl Into<String>, cookie_header: Option<&str>) -> Self {
        let header = cookie_header.unwrap_or_default();
        Self {
            path: path.into(),
            access_token: read_cookie(header, ACCESS_TOKEN_COOKIE),
            force_password_change: read_cookie(header, FORCE_PASSWORD_CHANGE_COOKIE),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn force_password_change(&self) -> bool {
        self.force_password_change.as_deref() == Some(FORCE_FLAG_ON)
    }
}

/// Outcome of a gate evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    Redirect(Redirect),
}

impl GateDecision {
    pub fn is_pass(&self) -> bool {
        matches!(self, GateDecision::Pass)
    }

    pub fn location(&self) -> Option<String> {
        match self {
            GateDecision::Pass => None,
            GateDecision::Redirect(redirect) => Some(redirect.location()),
        }
    }
}

/// Same-origin redirect target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub path: &'static str,
    pub query: Vec<(&'static str, String)>,
}

impl Redirect {
    fn to(path: &'static str) -> Self {
        Self { path, query: Vec::new() }
    }

    fn param(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    fn login(next: &str) -> Self {
        Self::to(LOGIN_PATH).param(NEXT_PARAM, next)
    }

    fn account_settings() -> Self {
        Self::to(ACCOUNT_PATH).param(FORCE_PASSWORD_CHANGE_PARAM, FORCE_FLAG_ON)
    }

    /// Path plus percent-encoded query, e.g. `/login?next=%2Freception`
    pub fn location(&self) -> String {
        if self.query.is_empty() {
            return self.path.to_string();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }

    /// Absolute target on the origin of the original request URL
    pub fn resolve(&self, original: &Url) -> Result<Url, url::ParseError> {
        original.join(&self.location())
    }
}

/// Evaluate the gate for one navigation.
///
/// First match wins: bypass paths pass untouched, `/login` is only reachable
/// while signed out, and everything else needs a token and, when a password
/// change is pending, must be `/my_account`.
pub fn decide(request: &GateRequest) -> GateDecision {
    let authenticated = request.is_authenticated();
    let forced = request.force_password_change();

    match classify(&request.path) {
        RouteClass::Bypass => GateDecision::Pass,
        RouteClass::Public => {
            if !authenticated {
                GateDecision::Pass
            } else if forced {
                GateDecision::Redirect(Redirect::account_settings())
            } else {
                GateDecision::Redirect(Redirect::to(ROOT_PATH))
            }
        }
        RouteClass::Protected => {
            if !authenticated {
                GateDecision::Redirect(Redirect::login(&request.path))
            } else if forced && request.path != ACCOUNT_PATH {
                GateDecision::Redirect(Redirect::account_settings())
            } else {
                GateDecision::Pass
            }
        }
    }
}
