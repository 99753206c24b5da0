use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::HeaderValue,
    middleware::from_fn,
    routing::{any, get},
    Router,
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::handlers::{self, proxy};
use crate::middleware::route_gate_middleware;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Proxy client: no redirect following, no transparent decompression
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.backend.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .no_gzip()
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }
}

pub fn app(state: AppState) -> Router {
    // Everything a browser can navigate to sits behind the gate
    let gated = proxy_routes(&state.config)
        .fallback(handlers::page_shell)
        .layer(from_fn(route_gate_middleware));

    Router::new()
        // Infrastructure probe, outside the gate
        .route("/healthz", get(handlers::health))
        .merge(gated)
        // Global middleware
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn proxy_routes(config: &AppConfig) -> Router<AppState> {
    let mut router = Router::new();

    for prefix in proxy::BACKEND_PREFIXES {
        router = router
            .route(prefix, any(proxy::backend))
            .route(&format!("{}/*rest", prefix), any(proxy::backend));
    }

    let mut mounted: Vec<&str> = proxy::BACKEND_PREFIXES.to_vec();
    for prefix in &config.backend.storage_prefixes {
        let prefix = prefix.trim_end_matches('/');
        if !is_mountable_prefix(prefix) || mounted.contains(&prefix) {
            tracing::warn!("Skipping storage prefix '{}'", prefix);
            continue;
        }
        mounted.push(prefix);
        router = router
            .route(prefix, any(proxy::storage))
            .route(&format!("{}/*rest", prefix), any(proxy::storage));
    }

    router
}

/// Literal path segments only, so the prefix can't turn into a route parameter
fn is_mountable_prefix(prefix: &str) -> bool {
    prefix.len() > 1
        && prefix.starts_with('/')
        && prefix[1..]
            .split('/')
            .all(|seg| !seg.is_empty() && seg.chars().all(is_segment_char))
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !config.security.enable_cors {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_prefix_validation() {
        assert!(is_mountable_prefix("/uploads"));
        assert!(is_mountable_prefix("/files/public"));
        assert!(!is_mountable_prefix("/"));
        assert!(!is_mountable_prefix("uploads"));
        assert!(!is_mountable_prefix("/:id"));
        assert!(!is_mountable_prefix("/a//b"));
    }

    #[test]
    fn builds_router_with_duplicate_prefixes() {
        let mut config = AppConfig::development();
        config.backend.storage_prefixes = vec!["/files".into(), "/files/".into(), "/api".into()];
        let _router = app(AppState::new(config).unwrap());
    }
}
