//! Lever job-board fetcher.
//!
//! Reads the public postings API (`api.lever.co/v0/postings/{slug}`), one
//! request per configured company, on the shared worker pool.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use super::trait_::{FetchBatch, FetchContext, Fetcher, Lead, run_company_pool};
use crate::config::CompanySource;
use crate::error::FetchError;
use crate::identity::vendor_source_id;

pub const LEVER_SOURCE: &str = "lever";

const API_BASE: &str = "https://api.lever.co/v0/postings";

/// Fetcher for companies hosting their board on Lever.
pub struct LeverFetcher {
    companies: Vec<String>,
    api_base: String,
}

impl LeverFetcher {
    pub fn new(cfg: &CompanySource) -> Self {
        Self::new_with_api_base(cfg, API_BASE)
    }

    /// Build against an alternate API base (tests aim this at a local
    /// server).
    pub fn new_with_api_base(cfg: &CompanySource, api_base: impl Into<String>) -> Self {
        Self {
            companies: cfg.companies.clone(),
            api_base: api_base.into(),
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for LeverFetcher {
    fn name(&self) -> &'static str {
        LEVER_SOURCE
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchBatch, FetchError> {
        let leads = run_company_pool(ctx, LEVER_SOURCE, &self.companies, {
            let ctx = ctx.clone();
            let api_base = self.api_base.clone();
            move |company| {
                let ctx = ctx.clone();
                let api_base = api_base.clone();
                async move { fetch_company(&ctx, &api_base, &company).await }
            }
        })
        .await;

        Ok(FetchBatch {
            source: LEVER_SOURCE.to_string(),
            leads,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeverPosting {
    id: String,
    /// Posting title
    text: String,
    #[serde(default)]
    hosted_url: String,
    #[serde(default)]
    apply_url: String,
    #[serde(default)]
    categories: LeverCategories,
    #[serde(default)]
    description_plain: String,
    /// "remote", "hybrid", "on-site", or "unspecified"
    #[serde(default)]
    workplace_type: String,
    /// Epoch milliseconds
    #[serde(default)]
    created_at: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct LeverCategories {
    #[serde(default)]
    location: String,
}

async fn fetch_company(
    ctx: &FetchContext,
    api_base: &str,
    company: &str,
) -> Result<Vec<Lead>, FetchError> {
    let url = Url::parse(&format!("{}/{}?mode=json", api_base, company))
        .map_err(|err| FetchError::Config(format!("bad lever url for {company}: {err}")))?;
    ctx.limiter.acquire_url(&url).await;

    let response = ctx.http.get(url).send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(FetchError::http(status, &body));
    }

    let postings: Vec<LeverPosting> =
        serde_json::from_str(&body).map_err(|_| FetchError::decode("lever postings", &body))?;

    Ok(postings
        .into_iter()
        .map(|posting| to_lead(company, posting))
        .collect())
}

fn to_lead(company: &str, posting: LeverPosting) -> Lead {
    let url = if posting.hosted_url.is_empty() {
        posting.apply_url.clone()
    } else {
        posting.hosted_url.clone()
    };

    Lead {
        company: company.to_string(),
        title: posting.text,
        url,
        location: posting.categories.location,
        work_mode: posting.workplace_type,
        vendor_id: Some(posting.id.clone()),
        description: posting.description_plain,
        posted_at: posting.created_at.and_then(epoch_millis_to_utc),
        source: LEVER_SOURCE.to_string(),
        source_id: vendor_source_id(LEVER_SOURCE, &[company, &posting.id]),
        logo_url: None,
    }
}

fn epoch_millis_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path, query_param};
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

    fn source(companies: &[&str]) -> CompanySource {
        CompanySource {
            enabled: true,
            companies: companies.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn posting(id: &str, title: &str) -> LeverPosting {
        LeverPosting {
            id: id.to_string(),
            text: title.to_string(),
            hosted_url: format!("https://jobs.lever.co/acme/{}", id),
            apply_url: format!("https://jobs.lever.co/acme/{}/apply", id),
            categories: LeverCategories {
                location: "Denver, CO".to_string(),
            },
            description_plain: "Build backend services in Rust.".to_string(),
            workplace_type: "remote".to_string(),
            created_at: Some(1_752_000_000_000),
        }
    }

    #[test]
    fn lead_mapping_uses_hosted_url_and_vendor_identity() {
        let lead = to_lead("acme", posting("123", "Backend Engineer"));

        assert_eq!(lead.source_id, "lever:acme:123");
        assert_eq!(lead.url, "https://jobs.lever.co/acme/123");
        assert_eq!(lead.vendor_id.as_deref(), Some("123"));
        assert_eq!(lead.work_mode, "remote");
        assert_eq!(lead.source, "lever");
        assert!(lead.posted_at.is_some());
    }

    #[test]
    fn lead_mapping_falls_back_to_apply_url() {
        let mut p = posting("9", "SRE");
        p.hosted_url.clear();
        let lead = to_lead("acme", p);
        assert_eq!(lead.url, "https://jobs.lever.co/acme/9/apply");
    }

    #[test]
    fn postings_json_decodes_with_missing_optional_fields() {
        let body = r#"[{"id":"ab-1","text":"Platform Engineer"}]"#;
        let postings: Vec<LeverPosting> = serde_json::from_str(body).unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].id, "ab-1");
        assert!(postings[0].hosted_url.is_empty());
        assert!(postings[0].created_at.is_none());
    }

    #[tokio::test]
    async fn fetch_maps_postings_from_the_api() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/acme"))
            .and(query_param("mode", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "id": "123",
                    "text": "Backend Engineer",
                    "hostedUrl": "https://jobs.lever.co/acme/123",
                    "categories": { "location": "Denver, CO" },
                    "descriptionPlain": "Build backend services in Rust.",
                    "workplaceType": "remote",
                    "createdAt": 1_752_000_000_000i64
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = LeverFetcher::new_with_api_base(&source(&["acme"]), server.uri());
        let batch = fetcher.fetch(&ctx()).await.unwrap();

        assert_eq!(batch.source, "lever");
        assert_eq!(batch.leads.len(), 1);
        assert_eq!(batch.leads[0].source_id, "lever:acme:123");
        assert_eq!(batch.leads[0].location, "Denver, CO");
    }

    #[tokio::test]
    async fn company_failures_shrink_the_batch_instead_of_failing_it() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/good"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{ "id": "1", "text": "SRE" }])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such board"))
            .mount(&server)
            .await;

        let fetcher = LeverFetcher::new_with_api_base(&source(&["good", "gone"]), server.uri());
        let batch = fetcher.fetch(&ctx()).await.unwrap();

        assert_eq!(batch.leads.len(), 1);
        assert_eq!(batch.leads[0].source_id, "lever:good:1");
    }
}
