//! Site resolver
//!
//! URLs are reduced to a root-domain key before comparison: scheme, `www.`,
//! path and TLD are dropped, so `https://www.Example.com/page` and
//! `example.com` both resolve to `example`.

use crate::lists::SiteList;
use std::collections::HashSet;

/// Reduce a URL to its root-domain key.
///
/// Returns an empty string for input that has no host part.
pub fn root_domain(url: &str) -> String {
    let lowered = url.trim().to_lowercase();
    let mut rest = lowered.as_str();

    for scheme in ["https://", "http://"] {
        if let Some(stripped) = rest.strip_prefix(scheme) {
            rest = stripped;
            break;
        }
    }
    if let Some(stripped) = rest.strip_prefix("www.") {
        rest = stripped;
    }

    let host = rest
        .split(|c| matches!(c, '/' | '?' | '#'))
        .next()
        .unwrap_or_default();

    match host.rfind('.') {
        Some(idx) => host[..idx].to_string(),
        None => host.to_string(),
    }
}

/// Resolves URLs against a site list snapshot
#[derive(Debug, Clone, Default)]
pub struct SiteMatcher {
    roots: HashSet<String>,
}

impl SiteMatcher {
    /// Pre-resolve every list entry to its root domain
    pub fn new(sites: &SiteList) -> Self {
        Self {
            roots: sites
                .iter()
                .map(|site| root_domain(site))
                .filter(|root| !root.is_empty())
                .collect(),
        }
    }

    /// True iff the URL resolves to the same root as a listed site.
    ///
    /// A URL whose root is empty never matches.
    pub fn is_site_blocked(&self, url: &str) -> bool {
        let root = root_domain(url);
        !root.is_empty() && self.roots.contains(&root)
    }

    /// First URL in `urls` that is blocked
    pub fn first_blocked<'a, I>(&self, urls: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        urls.into_iter().find(|url| self.is_site_blocked(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_domain_normalizes() {
        assert_eq!(root_domain("https://www.Example.com/page"), "example");
        assert_eq!(root_domain("example.com"), "example");
        assert_eq!(
            root_domain("https://www.Example.com/page"),
            root_domain("example.com")
        );
    }

    #[test]
    fn test_root_domain_variants() {
        assert_eq!(root_domain("http://example.com"), "example");
        assert_eq!(root_domain("  EXAMPLE.COM/a/b  "), "example");
        assert_eq!(root_domain("example.com?q=a.b"), "example");
        assert_eq!(root_domain("m.example.com/x"), "m.example");
        assert_eq!(root_domain("localhost"), "localhost");
    }

    #[test]
    fn test_root_domain_malformed() {
        assert_eq!(root_domain(""), "");
        assert_eq!(root_domain("https://"), "");
        assert_eq!(root_domain("/just/a/path"), "");
        assert_eq!(root_domain(".com"), "");
    }

    #[test]
    fn test_is_site_blocked() {
        let matcher = SiteMatcher::new(&SiteList::new(["pornhub.com", "https://www.xvideos.com/"]));
        assert!(matcher.is_site_blocked("https://www.pornhub.com/view?id=1"));
        assert!(matcher.is_site_blocked("xvideos.net"));
        assert!(!matcher.is_site_blocked("https://example.com"));
    }

    #[test]
    fn test_empty_root_never_matches() {
        let matcher = SiteMatcher::new(&SiteList::new(["/", "example.com"]));
        assert!(!matcher.is_site_blocked("/"));
        assert!(!matcher.is_site_blocked(""));
    }

    #[test]
    fn test_first_blocked() {
        let matcher = SiteMatcher::new(&SiteList::new(["onlyfans.com"]));
        let urls = vec!["news.com", "onlyfans.com/user", "other.org"];
        assert_eq!(matcher.first_blocked(urls), Some("onlyfans.com/user"));
    }

    #[test]
    fn test_www_and_path_variants_blocked() {
        let matcher = SiteMatcher::new(&SiteList::new(["xnxx.com"]));
        assert!(matcher.is_site_blocked("www.xnxx.com"));
        assert!(matcher.is_site_blocked("http://xnxx.com/video?id=1"));
        assert!(!matcher.is_site_blocked("example.com"));
    }
}
