//! Normalization and validation of operator input.
//!
//! The normalizers never reject shape problems they can repair; the
//! validators then reject what is left, cheap syntactic checks first.

use url::Url;

use crate::admin::error::AdminError;
use crate::routing::{PathPattern, RequestMethod};

/// Resolve `.`/`..` and redundant slashes. A trailing slash survives only if
/// the input had one.
pub fn normalize_path(raw: &str) -> String {
    let mut components: Vec<&str> = Vec::new();
    for component in raw.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            other => components.push(other),
        }
    }

    let mut path = format!("/{}", components.join("/"));
    if raw.ends_with('/') && path != "/" {
        path.push('/');
    }
    path
}

/// Parse an absolute http(s) URL and clean up its path.
///
/// Scheme and host are case-folded and default ports dropped by the parser.
pub fn normalize_url(raw: &str) -> Result<Url, AdminError> {
    let mut url = Url::parse(raw.trim()).map_err(|_| AdminError::InvalidUrl(raw.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(AdminError::InvalidUrl(raw.to_string()));
    }

    let path = normalize_path(url.path());
    url.set_path(&path);
    Ok(url)
}

pub fn normalize_method(raw: &str) -> Result<RequestMethod, AdminError> {
    raw.trim()
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| AdminError::InvalidMethod(raw.to_string()))
}

pub fn validate_trailing_slash(path: &str) -> Result<(), AdminError> {
    if path != "/" && path.ends_with('/') {
        return Err(AdminError::TrailingSlash(path.to_string()));
    }
    Ok(())
}

/// Plain string prefix test: `/administrator` is rejected under `/admin` too.
pub fn validate_reserved_prefix(path: &str, prefix: &str) -> Result<(), AdminError> {
    if path.starts_with(prefix) {
        return Err(AdminError::ReservedPrefix {
            path: path.to_string(),
            prefix: prefix.to_string(),
        });
    }
    Ok(())
}

/// Trailing slash, pattern shape, then the reserved prefix.
pub fn validate_source_path(path: &str, reserved_prefix: &str) -> Result<PathPattern, AdminError> {
    validate_trailing_slash(path)?;
    let pattern = PathPattern::parse(path)?;
    validate_reserved_prefix(path, reserved_prefix)?;
    Ok(pattern)
}
