//! First-insert enrichment: company domain discovery and logo caching.
//!
//! Runs only for rows that were actually inserted (plus the logo backfill
//! retry on duplicates that arrive carrying their own logo URL). Lookups go
//! run-cache → database cache → network, and network failures degrade to
//! "no logo" rather than erroring the row.

use std::collections::HashMap;

use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use sea_orm::DatabaseConnection;
use tracing::{debug, warn};
use url::Url;

use crate::error::RepositoryError;
use crate::identity::sha256_hex;
use crate::limiter::HostLimiter;
use crate::normalize::clean_text;
use crate::repositories::{CompanyDomainRepository, LogoCacheRepository};

const SEARCH_BASE: &str = "https://html.duckduckgo.com/html/";
const FAVICON_BASE: &str = "https://www.google.com/s2/favicons";

/// Largest image the logo cache will store.
pub const LOGO_MAX_BYTES: usize = 512 * 1024;

/// Trailing company-name words that never help a web search.
const COMPANY_SUFFIXES: &[&str] = &[
    "inc", "llc", "ltd", "corp", "co", "gmbh", "recruiting", "staffing", "agency", "talent",
];

/// Search-result domains that are never a company's own site.
const DOMAIN_BLOCKLIST: &[&str] = &[
    "linkedin.com",
    "indeed.com",
    "glassdoor.com",
    "ziprecruiter.com",
    "lever.co",
    "greenhouse.io",
    "myworkdayjobs.com",
    "smartrecruiters.com",
    "jobvite.com",
    "ashbyhq.com",
    "workable.com",
    "bamboohr.com",
    "facebook.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "youtube.com",
    "wikipedia.org",
    "crunchbase.com",
    "duckduckgo.com",
];

/// Per-cycle lookup caches. Lives on the single processing task; failed
/// lookups are cached as empty strings so a cycle never repeats them.
#[derive(Debug, Default)]
pub struct RunCaches {
    /// sanitized lowercase company name -> website domain
    domains: HashMap<String, String>,
    /// logo source (explicit URL or domain) -> logo cache key
    logos: HashMap<String, String>,
}

/// Resolves company domains and logo cache keys for freshly inserted rows.
pub struct Enricher<'a> {
    http: &'a reqwest::Client,
    limiter: &'a HostLimiter,
    db: &'a DatabaseConnection,
    search_base: String,
    favicon_base: String,
}

impl<'a> Enricher<'a> {
    pub fn new(
        http: &'a reqwest::Client,
        limiter: &'a HostLimiter,
        db: &'a DatabaseConnection,
    ) -> Self {
        Self {
            http,
            limiter,
            db,
            search_base: SEARCH_BASE.to_string(),
            favicon_base: FAVICON_BASE.to_string(),
        }
    }

    /// Create an enricher with explicit search and favicon endpoints.
    pub fn new_with_bases(
        http: &'a reqwest::Client,
        limiter: &'a HostLimiter,
        db: &'a DatabaseConnection,
        search_base: impl Into<String>,
        favicon_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            limiter,
            db,
            search_base: search_base.into(),
            favicon_base: favicon_base.into(),
        }
    }

    /// Resolve a logo cache key for a lead.
    ///
    /// An explicit logo URL (email alerts scrape one off the page) is tried
    /// first; otherwise the company's website domain is resolved and its
    /// favicon cached. Empty string means no logo could be obtained.
    pub async fn resolve_logo(
        &self,
        company: &str,
        logo_url: Option<&str>,
        caches: &mut RunCaches,
    ) -> Result<String, RepositoryError> {
        if let Some(url) = logo_url.map(str::trim).filter(|u| !u.is_empty()) {
            match caches.logos.get(url) {
                Some(key) if !key.is_empty() => return Ok(key.clone()),
                // Known-bad URL from earlier in the run; try the favicon.
                Some(_) => {}
                None => {
                    let key = self.cache_image_from_url(url).await?;
                    caches.logos.insert(url.to_string(), key.clone());
                    if !key.is_empty() {
                        return Ok(key);
                    }
                }
            }
        }

        let domain = self.resolve_company_domain(company, caches).await?;
        if domain.is_empty() {
            return Ok(String::new());
        }

        if let Some(key) = caches.logos.get(&domain) {
            return Ok(key.clone());
        }

        let favicon = format!("{}?domain={}&sz=64", self.favicon_base, domain);
        let key = self.cache_image_from_url(&favicon).await?;
        caches.logos.insert(domain, key.clone());
        Ok(key)
    }

    /// Resolve a company's website domain: run cache, then the
    /// `company_domains` table, then a live web search. Empty string means
    /// the lookup failed; the failure is cached for the rest of the run.
    pub async fn resolve_company_domain(
        &self,
        company: &str,
        caches: &mut RunCaches,
    ) -> Result<String, RepositoryError> {
        let name = sanitize_company(company);
        if name.is_empty() || name.eq_ignore_ascii_case("unknown") {
            return Ok(String::new());
        }
        let cache_key = name.to_lowercase();

        if let Some(domain) = caches.domains.get(&cache_key) {
            return Ok(domain.clone());
        }

        let repo = CompanyDomainRepository::new(self.db);
        if let Some(domain) = repo.get(&cache_key).await? {
            caches.domains.insert(cache_key, domain.clone());
            return Ok(domain);
        }

        let domain = self.search_domain(&name).await;
        if !domain.is_empty() {
            repo.upsert(&cache_key, &domain).await?;
        }
        caches.domains.insert(cache_key, domain.clone());
        Ok(domain)
    }

    async fn search_domain(&self, name: &str) -> String {
        if let Ok(base) = Url::parse(&self.search_base) {
            self.limiter.acquire_url(&base).await;
        }

        let query = format!("{} official website", name);
        let response = match self
            .http
            .get(&self.search_base)
            .query(&[("q", query.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(company = name, error = %err, "Domain search request failed");
                return String::new();
            }
        };

        if !response.status().is_success() {
            warn!(
                company = name,
                status = %response.status(),
                "Domain search rejected"
            );
            return String::new();
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!(company = name, error = %err, "Domain search body unreadable");
                return String::new();
            }
        };

        parse_first_result_domain(&body).unwrap_or_default()
    }

    /// Download an image and store it in the logo cache under
    /// sha-256(url).
    ///
    /// Only http(s) URLs are fetched, the content type must be an image,
    /// and bodies above [`LOGO_MAX_BYTES`] are discarded. All of those
    /// cases, and any network failure, come back as `Ok("")`; only
    /// cache-write failures are errors.
    pub async fn cache_image_from_url(&self, url: &str) -> Result<String, RepositoryError> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(url, error = %err, "Skipping unparseable logo url");
                return Ok(String::new());
            }
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            debug!(url, "Skipping non-http logo url");
            return Ok(String::new());
        }

        let key = sha256_hex(url);
        let repo = LogoCacheRepository::new(self.db);
        if repo.contains(&key).await? {
            return Ok(key);
        }

        self.limiter.acquire_url(&parsed).await;
        let response = match self.http.get(parsed).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(url, error = %err, "Logo fetch failed");
                return Ok(String::new());
            }
        };

        if !response.status().is_success() {
            debug!(url, status = %response.status(), "Logo fetch rejected");
            return Ok(String::new());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        if !content_type.starts_with("image/") {
            debug!(url, content_type, "Skipping non-image logo response");
            return Ok(String::new());
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(url, error = %err, "Logo body unreadable");
                return Ok(String::new());
            }
        };
        if bytes.is_empty() || bytes.len() > LOGO_MAX_BYTES {
            debug!(url, size = bytes.len(), "Skipping out-of-bounds logo body");
            return Ok(String::new());
        }

        repo.store(&key, &content_type, bytes.to_vec()).await?;
        Ok(key)
    }
}

/// Strip legal and agency suffixes off a company name before searching.
pub fn sanitize_company(raw: &str) -> String {
    let cleaned = clean_text(raw);
    let mut words: Vec<&str> = cleaned.split(' ').collect();

    while words.len() > 1 {
        let last = words[words.len() - 1]
            .trim_matches(|c: char| matches!(c, ',' | '.' | '(' | ')'))
            .to_ascii_lowercase();
        if COMPANY_SUFFIXES.contains(&last.as_str()) {
            words.pop();
        } else {
            break;
        }
    }

    words
        .join(" ")
        .trim_end_matches([',', '.', ' '])
        .to_string()
}

/// First organic search-result domain that is not a job board, ATS, or
/// social site. Kept synchronous so the parsed document never crosses an
/// await point.
pub(crate) fn parse_first_result_domain(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a.result__a").ok()?;

    for anchor in document.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(domain) = domain_from_result_href(href) else {
            continue;
        };
        if is_blocked_domain(&domain) {
            continue;
        }
        return Some(domain);
    }

    None
}

/// Extract the target domain from a search-result href, following the
/// `uddg` redirect parameter when the link goes through the search engine.
fn domain_from_result_href(href: &str) -> Option<String> {
    let absolute = match href.strip_prefix("//") {
        Some(rest) => format!("https://{}", rest),
        None => href.to_string(),
    };
    let parsed = Url::parse(&absolute).ok()?;

    let target = if parsed
        .host_str()
        .is_some_and(|host| host.ends_with("duckduckgo.com"))
    {
        let redirected = parsed
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, value)| value.into_owned())?;
        Url::parse(&redirected).ok()?
    } else {
        parsed
    };

    let host = target.host_str()?.to_ascii_lowercase();
    let domain = host.strip_prefix("www.").unwrap_or(&host);
    if domain.is_empty() {
        None
    } else {
        Some(domain.to_string())
    }
}

fn is_blocked_domain(domain: &str) -> bool {
    DOMAIN_BLOCKLIST
        .iter()
        .any(|blocked| domain == *blocked || domain.ends_with(&format!(".{}", blocked)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn company_suffixes_are_stripped() {
        assert_eq!(sanitize_company("Acme Inc."), "Acme");
        assert_eq!(sanitize_company("Globex Corp"), "Globex");
        assert_eq!(sanitize_company("Initech, LLC"), "Initech");
        assert_eq!(sanitize_company("Umbrella Staffing Agency"), "Umbrella");
        assert_eq!(sanitize_company("  Hooli  "), "Hooli");
        // A name that is only a suffix word stays as-is.
        assert_eq!(sanitize_company("Co"), "Co");
    }

    #[test]
    fn first_result_domain_follows_uddg_redirects() {
        let html = r#"
            <div class="results">
              <a class="result__a"
                 href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.acme.com%2Fabout&rut=abc">
                 Acme - Official Site</a>
            </div>
        "#;
        assert_eq!(parse_first_result_domain(html).as_deref(), Some("acme.com"));
    }

    #[test]
    fn blocked_domains_are_skipped_in_result_order() {
        let html = r#"
            <a class="result__a" href="https://www.linkedin.com/company/acme">Acme | LinkedIn</a>
            <a class="result__a" href="https://boards.greenhouse.io/acme">Acme Jobs</a>
            <a class="result__a" href="https://www.acme.io/">Acme</a>
        "#;
        assert_eq!(parse_first_result_domain(html).as_deref(), Some("acme.io"));
    }

    #[test]
    fn no_usable_result_yields_none() {
        assert_eq!(parse_first_result_domain("<p>no results</p>"), None);
        let all_blocked = r#"<a class="result__a" href="https://indeed.com/cmp/acme">x</a>"#;
        assert_eq!(parse_first_result_domain(all_blocked), None);
    }

    #[test]
    fn direct_result_hrefs_lose_their_www_prefix() {
        let html = r#"<a class="result__a" href="https://www.initech.com/">Initech</a>"#;
        assert_eq!(
            parse_first_result_domain(html).as_deref(),
            Some("initech.com")
        );
    }

    fn limiter() -> HostLimiter {
        HostLimiter::new(&RateLimitConfig {
            per_host_rps: 100,
            burst: 100,
        })
    }

    async fn test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    #[tokio::test]
    async fn image_caching_round_trips_and_skips_junk() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logo.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0x89, 0x50, 0x4e, 0x47]),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page.html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html></html>"),
            )
            .mount(&server)
            .await;

        let db = test_db().await;
        let http = reqwest::Client::new();
        let limiter = limiter();
        let enricher = Enricher::new(&http, &limiter, &db);

        let logo_url = format!("{}/logo.png", server.uri());
        let key = enricher.cache_image_from_url(&logo_url).await.unwrap();
        assert_eq!(key, sha256_hex(&logo_url));

        let stored = LogoCacheRepository::new(&db).get(&key).await.unwrap().unwrap();
        assert_eq!(stored.content_type, "image/png");
        assert_eq!(stored.bytes, vec![0x89, 0x50, 0x4e, 0x47]);

        // Non-image content type is skipped, not stored.
        let page_url = format!("{}/page.html", server.uri());
        assert_eq!(enricher.cache_image_from_url(&page_url).await.unwrap(), "");
        assert!(
            !LogoCacheRepository::new(&db)
                .contains(&sha256_hex(&page_url))
                .await
                .unwrap()
        );

        // Non-http schemes never leave the process.
        assert_eq!(
            enricher
                .cache_image_from_url("data:image/png;base64,AAAA")
                .await
                .unwrap(),
            ""
        );
    }

    #[tokio::test]
    async fn oversized_images_are_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/huge.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0u8; LOGO_MAX_BYTES + 1]),
            )
            .mount(&server)
            .await;

        let db = test_db().await;
        let http = reqwest::Client::new();
        let limiter = limiter();
        let enricher = Enricher::new(&http, &limiter, &db);

        let url = format!("{}/huge.png", server.uri());
        assert_eq!(enricher.cache_image_from_url(&url).await.unwrap(), "");
    }

    #[tokio::test]
    async fn domain_resolution_caches_hits_and_misses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .and(query_param("q", "Acme official website"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<a class="result__a" href="https://www.acme.com/">Acme</a>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let db = test_db().await;
        let http = reqwest::Client::new();
        let limiter = limiter();
        let enricher = Enricher::new_with_bases(
            &http,
            &limiter,
            &db,
            format!("{}/html/", server.uri()),
            format!("{}/favicons", server.uri()),
        );

        let mut caches = RunCaches::default();
        let domain = enricher
            .resolve_company_domain("Acme Inc.", &mut caches)
            .await
            .unwrap();
        assert_eq!(domain, "acme.com");

        // Second resolution is served from the run cache; the mock's
        // expect(1) would fail on a second request.
        let again = enricher
            .resolve_company_domain("Acme", &mut caches)
            .await
            .unwrap();
        assert_eq!(again, "acme.com");

        // And the database cache survives a fresh run cache.
        let mut fresh = RunCaches::default();
        let persisted = enricher
            .resolve_company_domain("acme", &mut fresh)
            .await
            .unwrap();
        assert_eq!(persisted, "acme.com");

        assert_eq!(
            CompanyDomainRepository::new(&db)
                .get("acme")
                .await
                .unwrap()
                .as_deref(),
            Some("acme.com")
        );
    }

    #[tokio::test]
    async fn unknown_company_is_never_searched() {
        let db = test_db().await;
        let http = reqwest::Client::new();
        let limiter = limiter();
        // Unroutable search base; a live request here would error loudly.
        let enricher =
            Enricher::new_with_bases(&http, &limiter, &db, "http://127.0.0.1:1/html/", FAVICON_BASE);

        let mut caches = RunCaches::default();
        assert_eq!(
            enricher
                .resolve_company_domain("Unknown", &mut caches)
                .await
                .unwrap(),
            ""
        );
        assert_eq!(
            enricher.resolve_company_domain("", &mut caches).await.unwrap(),
            ""
        );
    }

    #[tokio::test]
    async fn full_logo_resolution_prefers_explicit_url_then_favicon() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<a class="result__a" href="https://www.globex.com/">Globex</a>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/favicons"))
            .and(query_param("domain", "globex.com"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/x-icon")
                    .set_body_bytes(vec![1, 2, 3]),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/alert-logo.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .set_body_bytes(vec![9, 9]),
            )
            .mount(&server)
            .await;

        let db = test_db().await;
        let http = reqwest::Client::new();
        let limiter = limiter();
        let enricher = Enricher::new_with_bases(
            &http,
            &limiter,
            &db,
            format!("{}/html/", server.uri()),
            format!("{}/favicons", server.uri()),
        );

        let mut caches = RunCaches::default();

        // Explicit logo URL wins without touching domain discovery.
        let logo_url = format!("{}/alert-logo.jpg", server.uri());
        let key = enricher
            .resolve_logo("Globex", Some(&logo_url), &mut caches)
            .await
            .unwrap();
        assert_eq!(key, sha256_hex(&logo_url));

        // Without one, the favicon of the discovered domain is cached.
        let favicon_key = enricher
            .resolve_logo("Globex", None, &mut caches)
            .await
            .unwrap();
        let expected_url = format!("{}/favicons?domain=globex.com&sz=64", server.uri());
        assert_eq!(favicon_key, sha256_hex(&expected_url));
    }
}
