//! Fetcher trait definition
//!
//! Defines the standard interface that all job-source implementations
//! follow, the `Lead` shape they produce, and the bounded worker pool the
//! board-style sources share for per-company requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::limiter::HostLimiter;
use crate::secrets::SecretStore;

/// A candidate job posting produced by a fetcher.
///
/// Leads are ephemeral: the processor filters, scores, and maps them onto
/// job rows within the same poll cycle. They carry no state beyond what
/// the source exposed.
#[derive(Debug, Clone, Default)]
pub struct Lead {
    pub company: String,
    pub title: String,
    pub url: String,
    /// Raw location text as the source presented it
    pub location: String,
    /// Free-form work-mode hint ("remote", "hybrid", ...); normalized by
    /// the processor
    pub work_mode: String,
    /// Vendor-native job/requisition id, when the source exposes one
    pub vendor_id: Option<String>,
    pub description: String,
    pub posted_at: Option<DateTime<Utc>>,
    /// Originating source name; matches [`Fetcher::name`]
    pub source: String,
    /// Dedupe identity computed by the fetcher. Empty means only the URL
    /// identifies this posting and the processor derives a fallback.
    pub source_id: String,
    /// Pre-resolved logo URL when the source carries one
    pub logo_url: Option<String>,
}

/// One fetch cycle's output for a single source.
#[derive(Debug, Clone, Default)]
pub struct FetchBatch {
    pub source: String,
    pub leads: Vec<Lead>,
}

/// Shared runtime handles passed to every fetcher on every cycle.
#[derive(Clone)]
pub struct FetchContext {
    pub http: reqwest::Client,
    pub limiter: Arc<HostLimiter>,
    pub fetch: FetchConfig,
    pub secrets: Arc<dyn SecretStore>,
    pub cancel: CancellationToken,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Stable source identifier used for logging and timeout selection.
    fn name(&self) -> &'static str;

    /// Retrieve the current postings for this source.
    ///
    /// Per-company failures are logged and skipped so one bad tenant never
    /// empties the batch; the call errors only when the source as a whole
    /// cannot run (bad configuration, mailbox unreachable).
    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchBatch, FetchError>;
}

/// Run `job` once per company on a bounded worker pool.
///
/// Results flow through a channel sized to the company count, so workers
/// never block on the collector. Each job gets the per-company timeout;
/// failures are logged per company and the rest of the pool keeps going.
pub(crate) async fn run_company_pool<F, Fut>(
    ctx: &FetchContext,
    source: &'static str,
    companies: &[String],
    job: F,
) -> Vec<Lead>
where
    F: Fn(String) -> Fut + Clone + Send + 'static,
    Fut: std::future::Future<Output = Result<Vec<Lead>, FetchError>> + Send + 'static,
{
    let companies: Vec<String> = companies
        .iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();

    if companies.is_empty() {
        return Vec::new();
    }

    let workers = ctx.fetch.workers.max(1);
    let per_company = Duration::from_secs(ctx.fetch.company_timeout_seconds);
    let semaphore = Arc::new(Semaphore::new(workers));
    let (tx, mut rx) = mpsc::channel::<Vec<Lead>>(companies.len());

    let mut handles = Vec::with_capacity(companies.len());
    for company in companies {
        if ctx.cancel.is_cancelled() {
            break;
        }

        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let tx = tx.clone();
        let cancel = ctx.cancel.clone();
        let job = job.clone();

        let handle = tokio::spawn(async move {
            let _permit = permit;
            let outcome = tokio::select! {
                _ = cancel.cancelled() => Err(FetchError::Canceled),
                res = tokio::time::timeout(per_company, job(company.clone())) => match res {
                    Ok(inner) => inner,
                    Err(_) => Err(FetchError::Timeout {
                        seconds: per_company.as_secs(),
                    }),
                },
            };

            match outcome {
                Ok(leads) => {
                    debug!(source, company = %company, count = leads.len(), "Company fetch finished");
                    let _ = tx.send(leads).await;
                }
                Err(FetchError::Canceled) => {
                    debug!(source, company = %company, "Company fetch canceled");
                }
                Err(err) => {
                    warn!(source, company = %company, error = %err, "Company fetch failed");
                }
            }
        });
        handles.push(handle);
    }
    drop(tx);

    for handle in handles {
        let _ = handle.await;
    }

    let mut leads = Vec::new();
    while let Some(mut chunk) = rx.recv().await {
        leads.append(&mut chunk);
    }
    leads
}
