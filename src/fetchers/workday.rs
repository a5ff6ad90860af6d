//! Workday job-board fetcher.
//!
//! Talks to the CXS JSON endpoint behind each hosted board
//! (`{host}/wday/cxs/{tenant}/{site}/jobs`). The endpoint wants the
//! session cookies a browser would have, so each board visit starts with a
//! bootstrap GET of the board page through the shared cookie jar. Workday
//! tenants sit behind anti-bot frontends; a challenge response marks the
//! host blocked for the rest of the run.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock, RwLock};

use chrono::{DateTime, TimeZone, Utc};
use metrics::counter;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::trait_::{FetchBatch, FetchContext, Fetcher, Lead, run_company_pool};
use crate::config::WorkdaySource;
use crate::error::FetchError;
use crate::identity::vendor_source_id;

pub const WORKDAY_SOURCE: &str = "workday";

const PAGE_LIMIT: usize = 50;

static LOCALE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z]{2}-[A-Z]{2}$").unwrap());

/// Fetcher for companies hosting their board on Workday.
pub struct WorkdayFetcher {
    boards: Vec<String>,
}

impl WorkdayFetcher {
    pub fn new(cfg: &WorkdaySource) -> Self {
        Self {
            boards: cfg.boards.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for WorkdayFetcher {
    fn name(&self) -> &'static str {
        WORKDAY_SOURCE
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchBatch, FetchError> {
        // Hosts that answered with a bot challenge this run; sibling boards
        // on the same host skip straight to an error instead of retrying.
        let blocked: Arc<RwLock<HashSet<String>>> = Arc::new(RwLock::new(HashSet::new()));

        let leads = run_company_pool(ctx, WORKDAY_SOURCE, &self.boards, {
            let ctx = ctx.clone();
            let blocked = blocked.clone();
            move |board| {
                let ctx = ctx.clone();
                let blocked = blocked.clone();
                async move { fetch_board(&ctx, &blocked, &board).await }
            }
        })
        .await;

        Ok(FetchBatch {
            source: WORKDAY_SOURCE.to_string(),
            leads,
        })
    }
}

/// A hosted board URL picked apart into the pieces the CXS endpoint needs.
#[derive(Debug, Clone, PartialEq)]
struct BoardRef {
    /// Scheme plus authority, e.g. `https://acme.wd5.myworkdayjobs.com`.
    /// Kept from the configured URL so the CXS call hits the same server
    /// the board page came from.
    origin: String,
    /// Full host, e.g. `acme.wd5.myworkdayjobs.com`
    host: String,
    /// First host label, e.g. `acme`
    tenant: String,
    /// Board locale path segment, defaulting to `en-US`
    locale: String,
    /// Last path segment, e.g. `External`
    site: String,
    /// The configured board URL without a trailing slash
    base: String,
}

impl BoardRef {
    fn jobs_endpoint(&self) -> String {
        format!(
            "{}/wday/cxs/{}/{}/jobs",
            self.origin, self.tenant, self.site
        )
    }
}

fn parse_board_url(raw: &str) -> Result<BoardRef, FetchError> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| FetchError::Config(format!("invalid workday board url {:?}: {}", raw, e)))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| FetchError::Config(format!("workday board url {:?} has no host", raw)))?
        .to_lowercase();

    let tenant = host
        .split('.')
        .next()
        .filter(|label| !label.is_empty())
        .ok_or_else(|| FetchError::Config(format!("workday board url {:?} has no tenant", raw)))?
        .to_string();

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let site = segments
        .last()
        .map(|s| s.to_string())
        .ok_or_else(|| FetchError::Config(format!("workday board url {:?} has no site", raw)))?;

    let locale = segments
        .first()
        .filter(|seg| LOCALE_RE.is_match(seg))
        .map(|s| s.to_string())
        .unwrap_or_else(|| "en-US".to_string());

    let origin = match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    };

    Ok(BoardRef {
        origin,
        host,
        tenant,
        locale,
        site,
        base: raw.trim().trim_end_matches('/').to_string(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CxsResponse {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    job_postings: Vec<CxsPosting>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CxsPosting {
    #[serde(default)]
    title: String,
    #[serde(default)]
    external_path: String,
    #[serde(default)]
    locations_text: String,
    /// Usually carries the requisition id as its first entry
    #[serde(default)]
    bullet_fields: Vec<String>,
    /// Tenants report this as RFC 3339, a bare date, or an epoch number
    #[serde(default)]
    posted_on_date: Option<serde_json::Value>,
}

async fn fetch_board(
    ctx: &FetchContext,
    blocked: &RwLock<HashSet<String>>,
    board: &str,
) -> Result<Vec<Lead>, FetchError> {
    let board_ref = parse_board_url(board)?;

    if blocked.read().unwrap().contains(&board_ref.host) {
        return Err(FetchError::HostBlocked {
            host: board_ref.host,
        });
    }

    match fetch_board_inner(ctx, &board_ref).await {
        Ok(leads) => Ok(leads),
        Err(FetchError::HostBlocked { host }) => {
            let labels = vec![("host", host.clone())];
            counter!("host_blocked_total", &labels).increment(1);
            blocked.write().unwrap().insert(host.clone());
            Err(FetchError::HostBlocked { host })
        }
        Err(err) => Err(err),
    }
}

async fn fetch_board_inner(
    ctx: &FetchContext,
    board_ref: &BoardRef,
) -> Result<Vec<Lead>, FetchError> {
    bootstrap_session(ctx, board_ref).await?;

    let endpoint = board_ref.jobs_endpoint();
    let mut leads = Vec::new();
    let mut offset = 0usize;
    let mut rebootstrapped = false;

    loop {
        ctx.limiter.acquire(&board_ref.host).await;

        let body = serde_json::json!({
            "appliedFacets": {},
            "limit": PAGE_LIMIT,
            "offset": offset,
            "searchText": "",
        });

        let response = ctx
            .http
            .post(&endpoint)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if is_challenge(status, &text) {
            return Err(FetchError::HostBlocked {
                host: board_ref.host.clone(),
            });
        }

        if !status.is_success() {
            // The CXS endpoint rejects requests whose session cookies went
            // stale. Re-run the bootstrap once before giving up on the page.
            if status.is_client_error() && !rebootstrapped {
                debug!(
                    host = %board_ref.host,
                    status = status.as_u16(),
                    "Workday page rejected, refreshing session cookies"
                );
                rebootstrapped = true;
                bootstrap_session(ctx, board_ref).await?;
                continue;
            }
            return Err(FetchError::http(status, &text));
        }

        let page: CxsResponse = serde_json::from_str(&text)
            .map_err(|_| FetchError::decode("workday cxs jobs page", &text))?;

        let fetched = page.job_postings.len();
        leads.extend(
            page.job_postings
                .into_iter()
                .map(|p| to_lead(board_ref, p)),
        );

        offset += PAGE_LIMIT;
        if fetched < PAGE_LIMIT || offset >= page.total {
            break;
        }
    }

    Ok(leads)
}

/// GET the board page so the cookie jar holds whatever session and CSRF
/// cookies the tenant hands out. The response body is only inspected for
/// challenges.
async fn bootstrap_session(ctx: &FetchContext, board_ref: &BoardRef) -> Result<(), FetchError> {
    ctx.limiter.acquire(&board_ref.host).await;

    let response = ctx.http.get(&board_ref.base).send().await?;
    let status = response.status();
    let text = response.text().await?;

    if is_challenge(status, &text) {
        return Err(FetchError::HostBlocked {
            host: board_ref.host.clone(),
        });
    }
    if !status.is_success() {
        return Err(FetchError::http(status, &text));
    }

    Ok(())
}

/// Recognize anti-bot interstitials without depending on one vendor's
/// exact page markup.
fn is_challenge(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }

    let lower = body.to_lowercase();
    lower.contains("attention required")
        || (lower.contains("cloudflare") && lower.contains("checking your browser"))
        || lower.contains("/cdn-cgi/")
}

fn to_lead(board_ref: &BoardRef, posting: CxsPosting) -> Lead {
    let vendor_id = posting
        .bullet_fields
        .iter()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(|s| s.to_string())
        .or_else(|| requisition_from_path(&posting.external_path));

    // Site is part of the identity: the same requisition listed on two
    // sites of one tenant is two distinct postings.
    let source_id = vendor_id
        .as_deref()
        .map(|id| vendor_source_id(WORKDAY_SOURCE, &[&board_ref.tenant, &board_ref.site, id]))
        .unwrap_or_default();

    let url = if posting.external_path.is_empty() {
        board_ref.base.clone()
    } else {
        format!("{}{}", board_ref.base, posting.external_path)
    };

    Lead {
        company: board_ref.tenant.clone(),
        title: posting.title,
        url,
        location: posting.locations_text,
        work_mode: String::new(),
        vendor_id,
        description: String::new(),
        posted_at: posting.posted_on_date.as_ref().and_then(parse_posted_at),
        source: WORKDAY_SOURCE.to_string(),
        source_id,
        logo_url: None,
    }
}

/// Pull the requisition id out of an external path like
/// `/job/Denver/Backend-Engineer_JR-10023`.
fn requisition_from_path(path: &str) -> Option<String> {
    let last = path.rsplit('/').next()?;
    let candidate = last.rsplit('_').next()?;
    if candidate.is_empty() || candidate == last {
        return None;
    }
    Some(candidate.to_string())
}

/// Tenants disagree on the wire shape of posting dates.
fn parse_posted_at(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            let date = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
            let midnight = date.and_hms_opt(0, 0, 0)?;
            Some(Utc.from_utc_datetime(&midnight))
        }
        serde_json::Value::Number(n) => {
            let raw = n.as_i64()?;
            if raw >= 1_000_000_000_000 {
                DateTime::<Utc>::from_timestamp_millis(raw)
            } else {
                DateTime::<Utc>::from_timestamp(raw, 0)
            }
        }
        _ => None,
    }
}
