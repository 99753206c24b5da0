//! File URL resolution for attachments returned by the backend

use url::Url;

use crate::config::BackendConfig;

/// Turn a stored file reference into something a client can fetch.
///
/// Absolute `http(s)` URLs are returned untouched. Paths under one of the
/// storage prefixes resolve against the object-storage origin; any other
/// value is treated as a gateway-relative path.
pub fn resolve_file_url(backend: &BackendConfig, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(reference) {
        return matches!(url.scheme(), "http" | "https").then(|| url.to_string());
    }

    let path = if reference.starts_with('/') {
        reference.to_string()
    } else {
        format!("/{}", reference)
    };

    let under_storage = backend.storage_prefixes.iter().any(|prefix| {
        let prefix = prefix.trim_end_matches('/');
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    });

    if under_storage {
        Some(format!("{}{}", backend.storage_origin.trim_end_matches('/'), path))
    } else {
        Some(path)
    }
}
