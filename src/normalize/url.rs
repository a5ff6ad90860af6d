//! URL canonicalization for dedupe.
//!
//! Two links to the same posting must normalize to the same string no
//! matter which tracking-wrapped variant a source handed us. The output is
//! stable under re-application.

use url::Url;

/// Query parameters that only exist for attribution.
const TRACKING_PARAMS: &[&str] = &["gclid", "fbclid", "msclkid", "mc_cid", "mc_eid", "mkt_tok"];

/// Normalize a posting URL.
///
/// Lowercases scheme and host, drops the fragment, strips tracking
/// parameters, and re-encodes the remaining query in sorted order. LinkedIn
/// URLs keep only `currentJobId` since everything else in their query
/// string is session noise. Unparseable input comes back trimmed but
/// otherwise untouched.
pub fn canonical_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut parsed = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(_) => return trimmed.to_string(),
    };

    parsed.set_fragment(None);

    let linkedin = is_linkedin_host(parsed.host_str().unwrap_or(""));

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| {
            if linkedin {
                key == "currentJobId"
            } else {
                !is_tracking_param(key)
            }
        })
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if params.is_empty() {
        parsed.set_query(None);
    } else {
        params.sort();
        let mut encoded = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &params {
            encoded.append_pair(key, value);
        }
        parsed.set_query(Some(&encoded.finish()));
    }

    parsed.to_string()
}

fn is_linkedin_host(host: &str) -> bool {
    host == "linkedin.com" || host.ends_with(".linkedin.com")
}

fn is_tracking_param(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.starts_with("utm_") || TRACKING_PARAMS.contains(&lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_params_are_stripped() {
        let url = "https://example.com/jobs/123?utm_source=alert&utm_medium=email&gclid=abc&ref=x";
        assert_eq!(canonical_url(url), "https://example.com/jobs/123?ref=x");
    }

    #[test]
    fn scheme_and_host_lowercase_fragment_dropped() {
        assert_eq!(
            canonical_url("HTTPS://Example.COM/Jobs#section"),
            "https://example.com/Jobs"
        );
    }

    #[test]
    fn query_is_sorted() {
        assert_eq!(
            canonical_url("https://example.com/p?b=2&a=1&c=3"),
            "https://example.com/p?a=1&b=2&c=3"
        );
    }

    #[test]
    fn linkedin_keeps_only_current_job_id() {
        let url = "https://www.linkedin.com/jobs/view/456?currentJobId=456&trk=mail&refId=xyz";
        assert_eq!(
            canonical_url(url),
            "https://www.linkedin.com/jobs/view/456?currentJobId=456"
        );

        let bare = "https://www.linkedin.com/jobs/view/456?trk=mail";
        assert_eq!(canonical_url(bare), "https://www.linkedin.com/jobs/view/456");
    }

    #[test]
    fn idempotent() {
        let urls = [
            "https://example.com/jobs/123?utm_source=a&b=2&a=1#frag",
            "https://www.linkedin.com/jobs/view/9?currentJobId=9&trk=z",
            "not a url at all",
            "https://example.com/path with space?q=a b",
        ];
        for url in urls {
            let once = canonical_url(url);
            assert_eq!(canonical_url(&once), once, "not idempotent for {url}");
        }
    }

    #[test]
    fn unparseable_input_returns_trimmed_raw() {
        assert_eq!(canonical_url("  example.com/jobs  "), "example.com/jobs");
        assert_eq!(canonical_url(""), "");
        assert_eq!(canonical_url("   "), "");
    }

    #[test]
    fn differently_tracked_variants_collide() {
        let a = canonical_url("https://example.com/jobs/7?utm_campaign=x");
        let b = canonical_url("https://EXAMPLE.com/jobs/7#apply");
        assert_eq!(a, b);
    }
}
