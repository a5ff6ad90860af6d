//! Stable identity for postings across sources and poll cycles.
//!
//! Dedupe rides entirely on these ids, so they must never change for the
//! same posting. Vendor-native ids are preferred; email alerts fall back to
//! message-derived hashes; the last resort is a hash of the canonical URL.

use sha2::{Digest, Sha256};

/// Join a vendor label and its native id segments into a source id, e.g.
/// `lever:acme:e5fa1` or `workday:acme:jobs:R-1234`.
pub fn vendor_source_id(vendor: &str, segments: &[&str]) -> String {
    let mut id = String::from(vendor);
    for segment in segments {
        id.push(':');
        id.push_str(segment.trim());
    }
    id
}

/// Identity for an email-derived lead with no vendor id.
///
/// Prefers the RFC 5322 message id; falls back to sender+subject when the
/// message carries none. The canonical URL is always mixed in so the same
/// alert email pointing at two postings yields two ids.
pub fn email_source_id(
    message_id: Option<&str>,
    from: &str,
    subject: &str,
    canonical_url: &str,
) -> String {
    let seed = match message_id {
        Some(mid) if !mid.trim().is_empty() => {
            format!("mid:{}|url:{}", mid.trim(), canonical_url)
        }
        _ => format!("from:{}|sub:{}|url:{}", from.trim(), subject.trim(), canonical_url),
    };
    sha256_hex(&seed)
}

/// Last-resort identity: hash of the canonical URL alone. Empty input gives
/// an empty id; callers treat a missing URL as a hard error before this
/// point.
pub fn url_source_id(canonical_url: &str) -> String {
    if canonical_url.is_empty() {
        return String::new();
    }
    sha256_hex(&format!("url:{canonical_url}"))
}

/// Lowercase hex sha-256. Also used as the logo-cache key function.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn vendor_ids_join_segments() {
        assert_eq!(vendor_source_id("lever", &["acme", "123"]), "lever:acme:123");
        assert_eq!(
            vendor_source_id("workday", &["acme", "jobs", "R-1"]),
            "workday:acme:jobs:R-1"
        );
        assert_eq!(vendor_source_id("linkedin", &["99"]), "linkedin:99");
        assert_eq!(vendor_source_id("lever", &[" acme ", "123"]), "lever:acme:123");
    }

    #[test]
    fn email_id_prefers_message_id() {
        let url = "https://example.com/jobs/1";
        let with_mid = email_source_id(Some("<m1@mail>"), "a@b", "Alert", url);
        let with_other_mid = email_source_id(Some("<m2@mail>"), "a@b", "Alert", url);
        let without_mid = email_source_id(None, "a@b", "Alert", url);
        let blank_mid = email_source_id(Some("   "), "a@b", "Alert", url);

        assert_ne!(with_mid, with_other_mid);
        assert_ne!(with_mid, without_mid);
        assert_eq!(without_mid, blank_mid);
        assert_eq!(with_mid.len(), 64);
    }

    #[test]
    fn email_id_varies_with_url() {
        let a = email_source_id(Some("<m@x>"), "a@b", "s", "https://e.com/1");
        let b = email_source_id(Some("<m@x>"), "a@b", "s", "https://e.com/2");
        assert_ne!(a, b);
    }

    #[test]
    fn url_id_is_stable_and_empty_safe() {
        let a = url_source_id("https://example.com/jobs/1");
        let b = url_source_id("https://example.com/jobs/1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(url_source_id(""), "");
    }
}
