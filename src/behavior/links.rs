//! Result link normalization
//!
//! Two links point at the same destination iff their normalized keys are
//! equal or one key contains the other. The substring rule keeps
//! partial-path targets working; it is also permissive on short target
//! fragments, a trade-off kept on purpose (see DESIGN.md).

use url::Url;

/// One candidate link on a results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultLink {
    pub raw: String,
    pub key: String,
}

impl ResultLink {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let key = normalize(&raw);
        Self { raw, key }
    }

    /// Whether this link and `target_key` name the same destination.
    pub fn matches_key(&self, target_key: &str) -> bool {
        keys_match(&self.key, target_key)
    }
}

/// Normalize a URL for destination comparison: protocol, `www.` prefix,
/// query string, fragment and trailing slashes are all stripped.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Ok(parsed) = Url::parse(trimmed) {
        if let Some(host) = parsed.host_str() {
            let host = host.strip_prefix("www.").unwrap_or(host);
            let path = parsed.path().trim_end_matches('/');
            return format!("{}{}", host, path);
        }
    }

    // Bare domain/path targets ("example.com/page") don't parse as absolute
    // URLs; strip the same pieces by hand.
    let rest = trimmed.split_once("://").map(|(_, r)| r).unwrap_or(trimmed);
    let rest = rest.split(['?', '#']).next().unwrap_or(rest);
    let rest = rest.strip_prefix("www.").unwrap_or(rest);
    rest.trim_end_matches('/').to_string()
}

/// Destination equality over normalized keys: equal, or one contains the
/// other (covers partial-path targets in both directions).
pub fn keys_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(b) || b.contains(a)
}

/// Normalize both sides and compare.
pub fn same_destination(a: &str, b: &str) -> bool {
    keys_match(&normalize(a), &normalize(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_decorations() {
        assert_eq!(
            normalize("https://www.example.com/page/?utm=1"),
            "example.com/page"
        );
        assert_eq!(normalize("http://example.com/#section"), "example.com");
        assert_eq!(normalize("example.com/page/"), "example.com/page");
    }

    #[test]
    fn normalization_is_reflexive() {
        for raw in ["https://www.example.com/a", "example.com", "other.org/x?y=1"] {
            assert_eq!(normalize(raw), normalize(raw));
        }
    }

    #[test]
    fn partial_path_target_matches_full_link() {
        assert!(same_destination(
            "example.com/page",
            "https://www.example.com/page/?utm=1"
        ));
    }

    #[test]
    fn different_domains_do_not_match() {
        assert!(!same_destination("example.com", "https://other.com"));
    }

    #[test]
    fn matching_is_symmetric() {
        let pairs = [
            ("example.com/page", "https://www.example.com/page/?utm=1"),
            ("example.com", "https://other.com"),
            ("a.test/x", "a.test/x/y"),
        ];
        for (a, b) in pairs {
            assert_eq!(same_destination(a, b), same_destination(b, a));
        }
    }

    #[test]
    fn empty_keys_never_match() {
        assert!(!keys_match("", "example.com"));
        assert!(!keys_match("example.com", ""));
    }
}
