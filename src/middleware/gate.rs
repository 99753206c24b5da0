use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use url::Url;

use crate::gate::{decide, GateDecision, GateRequest};

/// Route gate middleware: lets the request through or answers with a
/// `307 Temporary Redirect`. Never touches cookies and never awaits anything
/// before deciding.
pub async fn route_gate_middleware(request: Request, next: Next) -> Response {
    let cookie_header = joined_cookie_header(request.headers());
    let gate_request =
        GateRequest::from_cookie_header(request.uri().path(), cookie_header.as_deref());

    match decide(&gate_request) {
        GateDecision::Pass => next.run(request).await,
        GateDecision::Redirect(redirect) => {
            let location = original_url(&request)
                .and_then(|url| redirect.resolve(&url).ok())
                .map(|url| url.to_string())
                .unwrap_or_else(|| redirect.location());

            tracing::debug!(
                "Gate redirect {} -> {} (authenticated: {}, force password change: {})",
                gate_request.path,
                location,
                gate_request.is_authenticated(),
                gate_request.force_password_change()
            );

            (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, location)]).into_response()
        }
    }
}

/// HTTP/2 clients may split cookies over several headers
fn joined_cookie_header(headers: &HeaderMap) -> Option<String> {
    let parts: Vec<&str> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

/// Reconstruct the URL the browser asked for, honouring reverse-proxy headers
fn original_url(request: &Request) -> Option<Url> {
    let headers = request.headers();
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let host = header_str("x-forwarded-host")
        .or_else(|| header_str(header::HOST.as_str()))
        .or_else(|| request.uri().authority().map(|a| a.as_str()))?;
    let scheme = header_str("x-forwarded-proto")
        .or_else(|| request.uri().scheme_str())
        .unwrap_or("http");
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Url::parse(&format!("{}://{}{}", scheme, host, path_and_query)).ok()
}
