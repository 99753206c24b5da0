// Reverse proxy for the gate's bypass paths.
//
// `/api/*`, `/oauth2/*` and `/login/oauth2/*` go to the backend origin and the
// configured file prefixes go to object storage. Requests and responses are
// passed through byte for byte; redirects are returned to the browser, never
// followed here.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{HeaderMap, HeaderName},
    response::Response,
};

use crate::app::AppState;
use crate::error::ApiError;

pub const BACKEND_PREFIXES: &[&str] = &["/api", "/oauth2", "/login/oauth2"];

const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Hop-by-hop headers (RFC 9110 §7.6.1) plus those re-derived per hop
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
            | "host"
            | "content-length"
    )
}

fn copy_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from.iter() {
        if !is_hop_by_hop(name) {
            to.append(name.clone(), value.clone());
        }
    }
}

pub async fn backend(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    let origin = state.config.backend.origin.clone();
    forward(&state, &origin, request).await
}

pub async fn storage(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    let origin = state.config.backend.storage_origin.clone();
    forward(&state, &origin, request).await
}

async fn forward(state: &AppState, origin: &str, request: Request) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = format!("{}{}", origin.trim_end_matches('/'), path_and_query);

    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| ApiError::payload_too_large("Request body too large"))?;

    let mut headers = HeaderMap::new();
    copy_headers(&parts.headers, &mut headers);

    tracing::debug!("Proxy {} {} -> {}", parts.method, path_and_query, target);

    let upstream = state
        .http
        .request(parts.method, &target)
        .headers(headers)
        .body(body)
        .send()
        .await?;

    let status = upstream.status();
    let mut response_headers = HeaderMap::new();
    copy_headers(upstream.headers(), &mut response_headers);
    let bytes = upstream.bytes().await?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}
