use axum::{extract::Query, http::Uri};
use serde::{Deserialize, Serialize};

use crate::gate::NEXT_PARAM;
use crate::middleware::ApiResponse;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub next: Option<String>,
    #[serde(rename = "forcePasswordChange")]
    pub force_password_change: Option<String>,
}

/// What the client needs to render a page the gate let through
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageShell {
    pub path: String,
    /// Where to continue after login; same-origin paths only
    pub next: Option<String>,
    /// Show the "please change your password" banner
    pub password_change_required: bool,
}

/// Fallback for every navigation that is not proxied
pub async fn page_shell(uri: Uri, query: Option<Query<PageQuery>>) -> ApiResponse<PageShell> {
    let query = query.map(|Query(q)| q).unwrap_or_default();

    ApiResponse::success(PageShell {
        path: uri.path().to_string(),
        next: query.next.as_deref().and_then(safe_next).map(str::to_string),
        password_change_required: query.force_password_change.as_deref() == Some("1"),
    })
}

/// Reject `next` targets that would leave the origin (`//evil.com`, `https://...`)
fn safe_next(next: &str) -> Option<&str> {
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        Some(next)
    } else {
        tracing::debug!("Ignoring off-origin {} parameter: {}", NEXT_PARAM, next);
        None
    }
}
