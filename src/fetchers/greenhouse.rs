//! Greenhouse job-board fetcher.
//!
//! Greenhouse has no public JSON listing for every board, so this reads
//! the hosted board page (`boards.greenhouse.io/{slug}`) and scrapes the
//! opening entries out of the HTML.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use super::trait_::{FetchBatch, FetchContext, Fetcher, Lead, run_company_pool};
use crate::config::CompanySource;
use crate::error::FetchError;
use crate::identity::vendor_source_id;
use crate::normalize::clean_text;

pub const GREENHOUSE_SOURCE: &str = "greenhouse";

const BOARD_BASE: &str = "https://boards.greenhouse.io";

static JOB_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/jobs/(\d+)").unwrap());

/// Fetcher for companies hosting their board on Greenhouse.
pub struct GreenhouseFetcher {
    companies: Vec<String>,
    board_base: String,
}

impl GreenhouseFetcher {
    pub fn new(cfg: &CompanySource) -> Self {
        Self::new_with_board_base(cfg, BOARD_BASE)
    }

    /// Build against an alternate board base (tests aim this at a local
    /// server).
    pub fn new_with_board_base(cfg: &CompanySource, board_base: impl Into<String>) -> Self {
        Self {
            companies: cfg.companies.clone(),
            board_base: board_base.into(),
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for GreenhouseFetcher {
    fn name(&self) -> &'static str {
        GREENHOUSE_SOURCE
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchBatch, FetchError> {
        let leads = run_company_pool(ctx, GREENHOUSE_SOURCE, &self.companies, {
            let ctx = ctx.clone();
            let board_base = self.board_base.clone();
            move |company| {
                let ctx = ctx.clone();
                let board_base = board_base.clone();
                async move { fetch_company(&ctx, &board_base, &company).await }
            }
        })
        .await;

        Ok(FetchBatch {
            source: GREENHOUSE_SOURCE.to_string(),
            leads,
        })
    }
}

async fn fetch_company(
    ctx: &FetchContext,
    board_base: &str,
    company: &str,
) -> Result<Vec<Lead>, FetchError> {
    let url = Url::parse(&format!("{}/{}", board_base, company))
        .map_err(|err| FetchError::Config(format!("bad greenhouse url for {company}: {err}")))?;
    ctx.limiter.acquire_url(&url).await;

    let response = ctx.http.get(url).send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(FetchError::http(status, &body));
    }

    parse_board(company, board_base, &body)
}

/// Scrape the opening entries out of a hosted board page. Kept synchronous
/// so the parsed document never crosses an await point.
fn parse_board(company: &str, board_base: &str, html: &str) -> Result<Vec<Lead>, FetchError> {
    let opening_sel = selector("div.opening")?;
    let anchor_sel = selector("a[href]")?;
    let location_sel = selector("span.location")?;

    let document = Html::parse_document(html);
    let mut leads = Vec::new();

    for opening in document.select(&opening_sel) {
        let Some(anchor) = opening.select(&anchor_sel).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };

        let title = clean_text(&anchor.text().collect::<Vec<_>>().join(" "));
        if title.is_empty() {
            continue;
        }

        let location = opening
            .select(&location_sel)
            .next()
            .map(|el| clean_text(&el.text().collect::<Vec<_>>().join(" ")))
            .unwrap_or_default();

        let url = absolutize(board_base, href);
        let source_id = JOB_ID_RE
            .captures(href)
            .and_then(|caps| caps.get(1))
            .map(|id| vendor_source_id(GREENHOUSE_SOURCE, &[company, id.as_str()]))
            .unwrap_or_default();
        let vendor_id = JOB_ID_RE
            .captures(href)
            .and_then(|caps| caps.get(1))
            .map(|id| id.as_str().to_string());

        leads.push(Lead {
            company: company.to_string(),
            title,
            url,
            location,
            work_mode: String::new(),
            vendor_id,
            description: String::new(),
            posted_at: None,
            source: GREENHOUSE_SOURCE.to_string(),
            source_id,
            logo_url: None,
        });
    }

    Ok(leads)
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::Config(format!("invalid selector: {}", e)))
}

fn absolutize(board_base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", board_base, href)
    } else {
        format!("{}/{}", board_base, href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::{FetchConfig, RateLimitConfig};
    use crate::limiter::HostLimiter;
    use crate::secrets::MemorySecretStore;

    fn ctx() -> FetchContext {
        FetchContext {
            http: reqwest::Client::new(),
            limiter: Arc::new(HostLimiter::new(&RateLimitConfig {
                per_host_rps: 100,
                burst: 100,
            })),
            fetch: FetchConfig::default(),
            secrets: Arc::new(MemorySecretStore::new(Vec::<(String, String)>::new())),
            cancel: CancellationToken::new(),
        }
    }

    const BOARD_HTML: &str = r#"
        <html><body>
          <section class="level-0">
            <div class="opening" department_id="4001">
              <a data-mapped="true" href="/acme/jobs/4012345">Backend Engineer, Rust</a>
              <span class="location">Remote - US</span>
            </div>
            <div class="opening">
              <a href="https://boards.greenhouse.io/acme/jobs/4019876">Staff Engineer</a>
              <span class="location">New York, NY</span>
            </div>
            <div class="opening">
              <a href="/acme/jobs/nonnumeric">Broken Row</a>
            </div>
          </section>
        </body></html>
    "#;

    #[test]
    fn parses_openings_with_ids_and_locations() {
        let leads = parse_board("acme", BOARD_BASE, BOARD_HTML).unwrap();
        assert_eq!(leads.len(), 3);

        assert_eq!(leads[0].title, "Backend Engineer, Rust");
        assert_eq!(leads[0].url, "https://boards.greenhouse.io/acme/jobs/4012345");
        assert_eq!(leads[0].location, "Remote - US");
        assert_eq!(leads[0].source_id, "greenhouse:acme:4012345");

        assert_eq!(leads[1].source_id, "greenhouse:acme:4019876");
        assert_eq!(leads[1].location, "New York, NY");
    }

    #[test]
    fn opening_without_numeric_id_gets_empty_source_id() {
        let leads = parse_board("acme", BOARD_BASE, BOARD_HTML).unwrap();
        assert_eq!(leads[2].title, "Broken Row");
        assert!(leads[2].source_id.is_empty());
        assert!(leads[2].vendor_id.is_none());
        assert!(leads[2].location.is_empty());
    }

    #[test]
    fn empty_board_yields_no_leads() {
        let leads = parse_board("acme", BOARD_BASE, "<html><body></body></html>").unwrap();
        assert!(leads.is_empty());
    }

    #[tokio::test]
    async fn fetch_scrapes_the_hosted_board_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/acme"))
            .respond_with(ResponseTemplate::new(200).set_body_string(BOARD_HTML))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = CompanySource {
            enabled: true,
            companies: vec!["acme".to_string()],
        };
        let fetcher = GreenhouseFetcher::new_with_board_base(&cfg, server.uri());
        let batch = fetcher.fetch(&ctx()).await.unwrap();

        assert_eq!(batch.source, "greenhouse");
        assert_eq!(batch.leads.len(), 3);
        // Relative hrefs resolve against the fetched board's own origin.
        assert_eq!(
            batch.leads[0].url,
            format!("{}/acme/jobs/4012345", server.uri())
        );
        assert_eq!(batch.leads[0].source_id, "greenhouse:acme:4012345");
    }
}
