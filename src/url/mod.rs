//! URL handling module for Lemmascope
//!
//! This module provides URL normalization, same-origin checks, relative path
//! computation and origin lookup for the configured site catalog.

mod domain;
mod normalize;

use crate::config::SiteEntry;
use crate::{UrlError, UrlResult};
use url::Url;

pub use domain::{extract_domain, same_host};
pub use normalize::normalize_url;

/// File extensions that are never fetched as pages
const SKIPPED_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".svg", ".ico", ".tif", ".tiff",
];

/// Returns true if the URL points at an image resource rather than a page
pub fn is_skipped_resource(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    SKIPPED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Computes the path of `url` relative to the site `origin`
///
/// The result always starts with `/` and keeps the query string, so
/// `http://example.test/a/b?page=2` becomes `/a/b?page=2`.
///
/// # Errors
///
/// * `UrlError::CrossOrigin` - The URL's host differs from the origin's host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use lemmascope::url::relative_path;
///
/// let origin = Url::parse("http://example.test").unwrap();
/// let page = Url::parse("http://example.test/a/b").unwrap();
/// assert_eq!(relative_path(&page, &origin).unwrap(), "/a/b");
/// ```
pub fn relative_path(url: &Url, origin: &Url) -> UrlResult<String> {
    if !same_host(url, origin) {
        return Err(UrlError::CrossOrigin {
            url: url.to_string(),
            origin: origin.to_string(),
        });
    }

    let mut path = url.path().to_string();
    if path.is_empty() {
        path.push('/');
    }
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }

    Ok(path)
}

/// Canonical storage key of a site origin: trimmed, without trailing slashes
pub fn origin_key(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Finds the configured site whose origin prefixes `url`
///
/// Trailing slashes on the configured origin are ignored and the comparison
/// is case-insensitive.
pub fn find_site<'a>(url: &str, sites: &'a [SiteEntry]) -> Option<&'a SiteEntry> {
    let candidate = url.trim().to_lowercase();
    sites.iter().find(|site| {
        let origin = site.url.trim_end_matches('/').to_lowercase();
        candidate == origin
            || candidate
                .strip_prefix(&origin)
                .map(|rest| rest.starts_with('/') || rest.starts_with('?'))
                .unwrap_or(false)
    })
}
