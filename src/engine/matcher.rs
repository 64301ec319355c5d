use url::Url;

/// Reduces a hostname to its rightmost two labels, e.g. `sub.example.com`
/// becomes `example.com`. Hostnames without a dot (`localhost`) are returned
/// unchanged. This is a syntactic reduction with no public-suffix awareness,
/// so multi-label suffixes like `co.uk` collapse to the suffix itself.
pub fn base_domain(hostname: &str) -> &str {
    match hostname.rmatch_indices('.').nth(1) {
        Some((idx, _)) => &hostname[idx + 1..],
        None => hostname,
    }
}

/// Returns true iff the base domain of `hostname` equals the base domain of
/// any entry in `blocked_domains`. Comparison is exact string equality after
/// base-domain reduction; callers normalize case beforehand.
pub fn is_blocked(hostname: &str, blocked_domains: &[String]) -> bool {
    let base = base_domain(hostname);
    blocked_domains.iter().any(|d| base_domain(d) == base)
}

/// DOM-layer match: raw substring containment of any blocked entry in the
/// embed's source URL. Intentionally stricter than the base-domain comparison
/// used on the request path; the two mechanisms are independent.
pub fn embed_src_matches(src: &str, blocked_domains: &[String]) -> bool {
    blocked_domains.iter().any(|d| src.contains(d.as_str()))
}

/// Extracts the `channel` query parameter from an embed source URL, used to
/// key the per-channel block breakdown. Relative or malformed URLs yield None.
pub fn channel_from_src(src: &str) -> Option<String> {
    let url = Url::parse(src).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "channel")
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(domains: &[&str]) -> Vec<String> {
        domains.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_base_domain_reduction() {
        assert_eq!(base_domain("sub.example.com"), "example.com");
        assert_eq!(base_domain("a.b.example.com"), "example.com");
        assert_eq!(base_domain("example.com"), "example.com");
        assert_eq!(base_domain("localhost"), "localhost");
    }

    #[test]
    fn test_base_domain_idempotent() {
        for h in ["deep.sub.example.com", "example.com", "localhost"] {
            assert_eq!(base_domain(base_domain(h)), base_domain(h));
        }
    }

    #[test]
    fn test_is_blocked_by_base_domain() {
        assert!(is_blocked("embed.twitch.tv", &list(&["twitch.tv"])));
        assert!(is_blocked("a.b.example.com", &list(&["example.com"])));
        assert!(!is_blocked("example.org", &list(&["example.com"])));
    }

    #[test]
    fn test_blocked_entries_compared_by_base_domain() {
        // Entries are reduced too, so two subdomains of one base match.
        assert!(is_blocked("embed.twitch.tv", &list(&["player.twitch.tv"])));
    }

    #[test]
    fn test_embed_src_substring_match() {
        let blocked = list(&["player.twitch.tv", "embed.twitch.tv"]);
        assert!(embed_src_matches(
            "https://embed.twitch.tv/?channel=somestreamer",
            &blocked
        ));
        assert!(!embed_src_matches("https://www.twitch.tv/videos", &blocked));
        // Unlike the base-domain comparison, a sibling subdomain entry does
        // not match here.
        assert!(!embed_src_matches(
            "https://embed.twitch.tv/?channel=somestreamer",
            &list(&["player.twitch.tv"])
        ));
    }

    #[test]
    fn test_channel_from_src() {
        assert_eq!(
            channel_from_src("https://embed.twitch.tv/?channel=somestreamer&parent=example.com"),
            Some("somestreamer".to_string())
        );
        assert_eq!(channel_from_src("https://embed.twitch.tv/"), None);
        assert_eq!(channel_from_src("/relative/embed"), None);
    }
}
