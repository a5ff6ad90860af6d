//! # Poll Orchestration
//!
//! One poll cycle = concurrent fetch across every registered source, then
//! serial lead processing, then one status update. The orchestrator owns
//! the single-flight rule: whoever wins the `running` flag runs the cycle,
//! every other caller is turned away until it finishes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use scopeguard::ScopeGuard;
use sea_orm::DatabaseConnection;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{FetchConfig, SourcesConfig};
use crate::error::FetchError;
use crate::fetchers::{EMAIL_SOURCE, FetchBatch, FetchContext, FetcherRegistry};
use crate::limiter::HostLimiter;
use crate::notify::JobNotifier;
use crate::process::{BatchStats, Enricher, LeadProcessor};
use crate::secrets::SecretStore;

pub mod poller;
pub mod status;

pub use poller::Poller;
pub use status::{PollStatus, StatusStore};

/// Another cycle currently holds the `running` flag.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("a poll cycle is already running")]
pub struct CycleInProgress;

/// Outcome of one source within a cycle: lead count or the error that
/// took the whole source down. Per-company failures inside a source never
/// surface here.
#[derive(Debug)]
pub struct SourceReport {
    pub source: &'static str,
    pub result: Result<usize, FetchError>,
}

/// Everything one finished cycle produced.
#[derive(Debug)]
pub struct CycleReport {
    pub sources: Vec<SourceReport>,
    pub stats: BatchStats,
    pub processing_timed_out: bool,
}

impl CycleReport {
    /// A cycle is ok when every source fetched and processing ran to the
    /// end. Filtered or duplicate leads are normal outcomes, not failures.
    pub fn is_ok(&self) -> bool {
        !self.processing_timed_out && self.sources.iter().all(|s| s.result.is_ok())
    }

    /// Human-readable roll-up of everything that went wrong, for the
    /// status record.
    pub fn error_summary(&self) -> String {
        let mut parts: Vec<String> = self
            .sources
            .iter()
            .filter_map(|s| {
                s.result
                    .as_ref()
                    .err()
                    .map(|err| format!("{}: {}", s.source, err))
            })
            .collect();
        if self.processing_timed_out {
            parts.push("lead processing timed out".to_string());
        }
        parts.join("; ")
    }
}

/// Runs poll cycles over a fixed fetcher registry.
///
/// Shared by the scheduler loop and the manual `/poll` endpoint; both go
/// through the same status store, so a cycle started from either side
/// blocks the other.
pub struct Orchestrator {
    db: DatabaseConnection,
    http: reqwest::Client,
    limiter: Arc<HostLimiter>,
    secrets: Arc<dyn SecretStore>,
    registry: Arc<FetcherRegistry>,
    sources: Arc<SourcesConfig>,
    fetch: FetchConfig,
    status: StatusStore,
    notifier: JobNotifier,
    cancel: CancellationToken,
    enrich_bases: Option<(String, String)>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: DatabaseConnection,
        http: reqwest::Client,
        limiter: Arc<HostLimiter>,
        secrets: Arc<dyn SecretStore>,
        registry: FetcherRegistry,
        sources: Arc<SourcesConfig>,
        fetch: FetchConfig,
        notifier: JobNotifier,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            db,
            http,
            limiter,
            secrets,
            registry: Arc::new(registry),
            sources,
            fetch,
            status: StatusStore::new(),
            notifier,
            cancel,
            enrich_bases: None,
        }
    }

    /// Point logo enrichment at alternate search/favicon endpoints (tests
    /// aim this at a local server).
    pub fn with_enrich_bases(
        mut self,
        search_base: impl Into<String>,
        favicon_base: impl Into<String>,
    ) -> Self {
        self.enrich_bases = Some((search_base.into(), favicon_base.into()));
        self
    }

    pub fn status(&self) -> &StatusStore {
        &self.status
    }

    pub fn source_count(&self) -> usize {
        self.registry.len()
    }

    /// Run one full cycle, or bail out immediately if one is already
    /// running.
    pub async fn poll_once(&self) -> Result<CycleReport, CycleInProgress> {
        if !self.status.try_begin() {
            return Err(CycleInProgress);
        }
        Ok(self.run_begun_cycle().await)
    }

    /// Claim the running flag and, on success, run the cycle on a detached
    /// task. Returns whether a cycle was started; the manual poll endpoint
    /// maps `false` to a conflict response.
    pub fn spawn_cycle(self: &Arc<Self>) -> bool {
        if !self.status.try_begin() {
            return false;
        }
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator.run_begun_cycle().await;
        });
        true
    }

    /// Cycle body. The caller must already hold the running flag; this
    /// always releases it, through the status store on completion or
    /// through the abort guard if the future is dropped mid-flight.
    #[instrument(skip_all)]
    async fn run_begun_cycle(&self) -> CycleReport {
        let started = Instant::now();
        counter!("poll_cycles_total").increment(1);
        let guard = scopeguard::guard(self.status.clone(), |status| status.record_aborted());

        let fetched = self.fetch_all().await;

        let mut stats = BatchStats::default();
        let mut processing_timed_out = false;
        let mut reports = Vec::with_capacity(fetched.len());
        let mut batches = Vec::new();
        for (source, result) in fetched {
            match result {
                Ok(batch) => {
                    reports.push(SourceReport {
                        source,
                        result: Ok(batch.leads.len()),
                    });
                    batches.push(batch);
                }
                Err(err) => reports.push(SourceReport {
                    source,
                    result: Err(err),
                }),
            }
        }

        let enricher = match &self.enrich_bases {
            Some((search, favicon)) => Enricher::new_with_bases(
                &self.http,
                self.limiter.as_ref(),
                &self.db,
                search.clone(),
                favicon.clone(),
            ),
            None => Enricher::new(&self.http, self.limiter.as_ref(), &self.db),
        };
        let mut processor = LeadProcessor::new_with_enricher(
            &self.db,
            self.sources.as_ref(),
            self.notifier.clone(),
            enricher,
        );

        let deadline = Duration::from_secs(self.fetch.insert_timeout_seconds);
        let processed = tokio::time::timeout(deadline, async {
            for batch in batches {
                stats.absorb(processor.process_batch(batch).await);
            }
        })
        .await;
        if processed.is_err() {
            processing_timed_out = true;
            warn!(
                timeout_seconds = self.fetch.insert_timeout_seconds,
                "Lead processing phase timed out; remaining batches dropped"
            );
        }

        histogram!("poll_cycle_duration_ms").record(started.elapsed().as_secs_f64() * 1_000.0);

        let report = CycleReport {
            sources: reports,
            stats,
            processing_timed_out,
        };

        // Cycle ran to the end, the guard's abort path must not fire.
        let status = ScopeGuard::into_inner(guard);
        if report.is_ok() {
            info!(
                inserted = report.stats.inserted,
                duplicates = report.stats.duplicates,
                filtered = report.stats.filtered,
                failed = report.stats.failed,
                "Poll cycle finished"
            );
            status.finish_ok(report.stats.inserted as u64);
        } else {
            let summary = report.error_summary();
            warn!(error = %summary, "Poll cycle finished with failures");
            status.finish_err(summary, report.stats.inserted as u64);
        }

        report
    }

    /// Fan out one fetch task per registered source and collect every
    /// outcome. A failed or timed-out source reports its error; it never
    /// cancels the others.
    async fn fetch_all(&self) -> Vec<(&'static str, Result<FetchBatch, FetchError>)> {
        let mut handles = Vec::with_capacity(self.registry.len());
        for fetcher in self.registry.fetchers() {
            let name = fetcher.name();
            let fetcher = Arc::clone(fetcher);
            let ctx = FetchContext {
                http: self.http.clone(),
                limiter: Arc::clone(&self.limiter),
                fetch: self.fetch.clone(),
                secrets: Arc::clone(&self.secrets),
                cancel: self.cancel.child_token(),
            };
            let deadline = self.source_deadline(name);
            let handle = tokio::spawn(async move {
                tokio::time::timeout(deadline, fetcher.fetch(&ctx))
                    .await
                    .unwrap_or(Err(FetchError::Timeout {
                        seconds: deadline.as_secs(),
                    }))
            });
            handles.push((name, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (source, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(FetchError::Task(join_err.to_string())),
            };
            match &result {
                Ok(batch) => {
                    debug!(source, leads = batch.leads.len(), "Source fetch finished");
                    let metric_labels = vec![("source", source.to_string())];
                    counter!("leads_fetched_total", &metric_labels)
                        .increment(batch.leads.len() as u64);
                }
                Err(err) => {
                    warn!(
                        source,
                        error = %err,
                        transient = err.is_transient(),
                        "Source fetch failed"
                    );
                    let metric_labels = vec![("source", source.to_string())];
                    counter!("fetch_failures_total", &metric_labels).increment(1);
                }
            }
            results.push((source, result));
        }
        results
    }

    /// Mailbox scans get their own, shorter budget; board sources share
    /// the ATS budget.
    fn source_deadline(&self, source: &str) -> Duration {
        let seconds = if source == EMAIL_SOURCE {
            self.fetch.email_timeout_seconds
        } else {
            self.fetch.ats_timeout_seconds
        };
        Duration::from_secs(seconds)
    }
}
