use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use lemmascope::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if both URLs point at the same host and port
///
/// The scheme is not compared, so `http://` links found on an `https://`
/// origin still count as the same site.
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (extract_domain(a), extract_domain(b)) {
        (Some(host_a), Some(host_b)) if host_a == host_b => {
            a.port() == b.port() || a.port_or_known_default() == b.port_or_known_default()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("http://127.0.0.1:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("127.0.0.1".to_string()));
    }

    #[test]
    fn test_same_host() {
        let a = Url::parse("http://example.test/a").unwrap();
        let b = Url::parse("http://example.test/b?x=1").unwrap();
        let c = Url::parse("http://other.test/a").unwrap();
        let d = Url::parse("https://example.test/a").unwrap();
        let e = Url::parse("http://example.test:9000/a").unwrap();

        assert!(same_host(&a, &b));
        assert!(!same_host(&a, &c));
        assert!(same_host(&a, &d));
        assert!(!same_host(&a, &e));
    }
}
