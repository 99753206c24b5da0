//! Route classification sets used by the gate

/// Never inspected by the gate: framework assets, the API proxy and OAuth callbacks
pub const BYPASS_PREFIXES: &[&str] = &["/_next", "/api", "/oauth2", "/login/oauth2"];

pub const BYPASS_EXACT: &[&str] = &["/favicon.ico"];

/// Reachable only while signed out
pub const PUBLIC_PATHS: &[&str] = &["/login"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Bypass,
    Public,
    Protected,
}

/// Classify a request path. Bypass is checked first so that
/// `/login/oauth2/...` never collides with the public `/login` page.
pub fn classify(path: &str) -> RouteClass {
    if is_bypass(path) {
        RouteClass::Bypass
    } else if PUBLIC_PATHS.contains(&path) {
        RouteClass::Public
    } else {
        RouteClass::Protected
    }
}

fn is_bypass(path: &str) -> bool {
    BYPASS_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
        || BYPASS_EXACT.contains(&path)
        // Anything with a file extension is treated as a static file
        || path.contains('.')
}
