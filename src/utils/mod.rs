//! Utility functions and helpers.

pub mod http;

use url::Url;

/// Resolve a potentially relative href against a base URL.
///
/// Returns `None` for unparseable hrefs and for non-web schemes
/// such as `mailto:` or `javascript:`.
pub fn resolve_url(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let resolved = base.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

/// Whether the URL's path contains any of the given markers.
pub fn path_contains_any(url: &Url, markers: &[String]) -> bool {
    let path = url.path();
    markers.iter().any(|m| path.contains(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/path/").unwrap();
        assert_eq!(
            resolve_url(&base, "page.html").unwrap().as_str(),
            "https://example.com/path/page.html"
        );
        assert_eq!(
            resolve_url(&base, "/root.html").unwrap().as_str(),
            "https://example.com/root.html"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x").unwrap().as_str(),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_resolve_url_rejects_non_web() {
        let base = Url::parse("https://example.com/").unwrap();
        assert!(resolve_url(&base, "mailto:press@example.com").is_none());
        assert!(resolve_url(&base, "javascript:void(0)").is_none());
        assert!(resolve_url(&base, "   ").is_none());
    }

    #[test]
    fn test_path_contains_any() {
        let markers = vec!["/nyheter".to_string()];
        let hit = Url::parse("https://example.com/nyheter/a").unwrap();
        let query_only = Url::parse("https://example.com/sok?q=/nyheter").unwrap();
        assert!(path_contains_any(&hit, &markers));
        assert!(!path_contains_any(&query_only, &markers));
    }
}
