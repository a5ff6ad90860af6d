//! SmartRecruiters job-board fetcher.
//!
//! Pages through the public postings API
//! (`api.smartrecruiters.com/v1/companies/{slug}/postings`) per configured
//! company.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use super::trait_::{FetchBatch, FetchContext, Fetcher, Lead, run_company_pool};
use crate::config::CompanySource;
use crate::error::FetchError;
use crate::identity::vendor_source_id;

pub const SMARTRECRUITERS_SOURCE: &str = "smartrecruiters";

const API_BASE: &str = "https://api.smartrecruiters.com/v1/companies";
const PAGE_LIMIT: usize = 100;

/// Hard ceiling on pagination depth; the public API rejects offsets past
/// this point.
const MAX_OFFSET: usize = 5000;

/// Fetcher for companies hosting their board on SmartRecruiters.
pub struct SmartRecruitersFetcher {
    companies: Vec<String>,
    api_base: String,
}

impl SmartRecruitersFetcher {
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
impl Fetcher for SmartRecruitersFetcher {
    fn name(&self) -> &'static str {
        SMARTRECRUITERS_SOURCE
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchBatch, FetchError> {
        let leads = run_company_pool(ctx, SMARTRECRUITERS_SOURCE, &self.companies, {
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
            source: SMARTRECRUITERS_SOURCE.to_string(),
            leads,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostingsPage {
    #[serde(default)]
    total_found: usize,
    #[serde(default)]
    content: Vec<SrPosting>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SrPosting {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    released_date: Option<DateTime<Utc>>,
    #[serde(default)]
    location: SrLocation,
}

#[derive(Debug, Default, Deserialize)]
struct SrLocation {
    #[serde(default)]
    city: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    remote: bool,
}

async fn fetch_company(
    ctx: &FetchContext,
    api_base: &str,
    company: &str,
) -> Result<Vec<Lead>, FetchError> {
    let mut leads = Vec::new();
    let mut offset = 0usize;

    loop {
        let url = Url::parse(&format!(
            "{}/{}/postings?limit={}&offset={}",
            api_base, company, PAGE_LIMIT, offset
        ))
        .map_err(|err| {
            FetchError::Config(format!("bad smartrecruiters url for {company}: {err}"))
        })?;
        ctx.limiter.acquire_url(&url).await;

        let response = ctx.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::http(status, &body));
        }

        let page: PostingsPage = serde_json::from_str(&body)
            .map_err(|_| FetchError::decode("smartrecruiters postings page", &body))?;

        let fetched = page.content.len();
        leads.extend(page.content.into_iter().map(|p| to_lead(company, p)));

        offset += PAGE_LIMIT;
        if fetched < PAGE_LIMIT || offset >= page.total_found || offset >= MAX_OFFSET {
            break;
        }
    }

    Ok(leads)
}

fn to_lead(company: &str, posting: SrPosting) -> Lead {
    Lead {
        company: company.to_string(),
        title: posting.name,
        url: format!(
            "https://jobs.smartrecruiters.com/{}/{}",
            company, posting.id
        ),
        location: format_location(&posting.location),
        work_mode: if posting.location.remote {
            "remote".to_string()
        } else {
            String::new()
        },
        vendor_id: Some(posting.id.clone()),
        description: String::new(),
        posted_at: posting.released_date,
        source: SMARTRECRUITERS_SOURCE.to_string(),
        source_id: vendor_source_id(SMARTRECRUITERS_SOURCE, &[company, &posting.id]),
        logo_url: None,
    }
}

fn format_location(location: &SrLocation) -> String {
    [&location.city, &location.region, &location.country]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
