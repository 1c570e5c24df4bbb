//! Utility functions and helpers.

pub mod http;

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Strip query and fragment from a URL, keeping scheme/host/path.
///
/// Tariff portals decorate download links with session tokens; the cleaned
/// form is what the store keys on.
pub fn clean_url(url_str: &str) -> Option<String> {
    let mut url = Url::parse(url_str).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}

/// Last path segment of a URL, used as the document display name.
pub fn document_name(url_str: &str) -> String {
    Url::parse(url_str)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(|s| s.to_string()))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown.pdf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/path/").unwrap();
        assert_eq!(
            resolve_url(&base, "page.pdf"),
            "https://example.com/path/page.pdf"
        );
        assert_eq!(
            resolve_url(&base, "/root.pdf"),
            "https://example.com/root.pdf"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_clean_url() {
        assert_eq!(
            clean_url("https://example.com/a.pdf?token=abc#page=2"),
            Some("https://example.com/a.pdf".to_string())
        );
        assert_eq!(
            clean_url("https://example.com/a.pdf"),
            Some("https://example.com/a.pdf".to_string())
        );
        assert_eq!(clean_url("not a url"), None);
    }

    #[test]
    fn test_get_domain() {
        assert_eq!(
            get_domain("https://example.com/path"),
            Some("example.com".to_string())
        );
        assert_eq!(
            get_domain("https://sub.example.com:8080/path"),
            Some("sub.example.com".to_string())
        );
    }

    #[test]
    fn test_document_name() {
        assert_eq!(
            document_name("https://example.com/rates/tariff-v1.pdf"),
            "tariff-v1.pdf"
        );
        assert_eq!(document_name("https://example.com/"), "unknown.pdf");
        assert_eq!(document_name("::nonsense::"), "unknown.pdf");
    }
}
