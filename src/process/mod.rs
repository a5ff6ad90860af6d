//! # Lead Processing
//!
//! The serial half of a poll cycle. Every fetched lead goes through
//! filter, row building, idempotent insert, first-insert enrichment, and
//! notification, in arrival order. Per-row failures are logged and
//! skipped; a batch always runs to its end.

use metrics::counter;
use sea_orm::DatabaseConnection;
use tracing::{debug, info, warn};

use crate::config::SourcesConfig;
use crate::error::ProcessError;
use crate::fetchers::{FetchBatch, Lead};
use crate::identity::url_source_id;
use crate::limiter::HostLimiter;
use crate::normalize::{WorkMode, canonical_url, clean_text, infer_work_mode, normalize_location};
use crate::notify::{JobEvent, JobNotifier};
use crate::rank::{score, should_keep};
use crate::repositories::{JobRepository, NewJob};

pub mod enrich;

pub use enrich::{Enricher, RunCaches};

/// What happened to one lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Inserted,
    Duplicate,
    Filtered(&'static str),
}

/// Row counts for one processed batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub inserted: usize,
    pub duplicates: usize,
    pub filtered: usize,
    pub failed: usize,
}

impl BatchStats {
    pub fn absorb(&mut self, other: BatchStats) {
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.filtered += other.filtered;
        self.failed += other.failed;
    }
}

/// Drives leads through the filter/persist/enrich pipeline. One instance
/// per poll cycle; its run caches are scoped to that cycle.
pub struct LeadProcessor<'a> {
    db: &'a DatabaseConnection,
    sources: &'a SourcesConfig,
    notifier: JobNotifier,
    enricher: Enricher<'a>,
    caches: RunCaches,
}

impl<'a> LeadProcessor<'a> {
    pub fn new(
        db: &'a DatabaseConnection,
        http: &'a reqwest::Client,
        limiter: &'a HostLimiter,
        sources: &'a SourcesConfig,
        notifier: JobNotifier,
    ) -> Self {
        let enricher = Enricher::new(http, limiter, db);
        Self::new_with_enricher(db, sources, notifier, enricher)
    }

    /// Build a processor around a preconfigured enricher (tests point its
    /// search and favicon endpoints at a local server).
    pub fn new_with_enricher(
        db: &'a DatabaseConnection,
        sources: &'a SourcesConfig,
        notifier: JobNotifier,
        enricher: Enricher<'a>,
    ) -> Self {
        Self {
            db,
            sources,
            notifier,
            enricher,
            caches: RunCaches::default(),
        }
    }

    /// Process one batch to completion, in lead arrival order.
    pub async fn process_batch(&mut self, batch: FetchBatch) -> BatchStats {
        let mut stats = BatchStats::default();

        for lead in batch.leads {
            match self.process_lead(&lead).await {
                Ok(ProcessOutcome::Inserted) => stats.inserted += 1,
                Ok(ProcessOutcome::Duplicate) => stats.duplicates += 1,
                Ok(ProcessOutcome::Filtered(_)) => stats.filtered += 1,
                Err(err) => {
                    stats.failed += 1;
                    warn!(source = %batch.source, error = %err, "Lead processing failed");
                    let metric_labels = vec![("source", batch.source.clone())];
                    counter!("process_failures_total", &metric_labels).increment(1);
                }
            }
        }

        info!(
            source = %batch.source,
            inserted = stats.inserted,
            duplicates = stats.duplicates,
            filtered = stats.filtered,
            failed = stats.failed,
            "Processed batch"
        );

        stats
    }

    async fn process_lead(&mut self, lead: &Lead) -> Result<ProcessOutcome, ProcessError> {
        let verdict = should_keep(
            &lead.title,
            &lead.location,
            &lead.description,
            &self.sources.filters,
            &self.sources.scoring,
        );
        if !verdict.keep {
            let reason = verdict.reason.unwrap_or("rejected");
            debug!(
                source = %lead.source,
                title = %lead.title,
                reason,
                "Lead filtered out"
            );
            let metric_labels = vec![("reason", reason.to_string())];
            counter!("leads_filtered_total", &metric_labels).increment(1);
            return Ok(ProcessOutcome::Filtered(reason));
        }

        let canonical = canonical_url(&lead.url);
        if canonical.is_empty() {
            return Err(ProcessError::MissingUrl {
                source_name: lead.source.clone(),
                company: lead.company.clone(),
                title: lead.title.clone(),
            });
        }

        let source_id = if lead.source_id.trim().is_empty() {
            url_source_id(&canonical)
        } else {
            lead.source_id.clone()
        };

        let scored = score(&lead.title, &lead.description, &self.sources.scoring);

        let company = non_empty_or(clean_text(&lead.company), "Unknown");
        let title = non_empty_or(clean_text(&lead.title), "Job Posting");
        let location = non_empty_or(normalize_location(&lead.location), "Unknown");
        let mut work_mode = WorkMode::from_label(&lead.work_mode);
        if work_mode == WorkMode::Unknown {
            work_mode = infer_work_mode(&format!(
                "{} {} {}",
                lead.location, lead.title, lead.description
            ));
        }

        let row = NewJob {
            company: company.clone(),
            title: title.clone(),
            location,
            work_mode: work_mode.as_str().to_string(),
            url: canonical.clone(),
            score: scored.score,
            tags: scored.tags,
            posted_at: lead.posted_at,
            source_id: source_id.clone(),
            source: lead.source.clone(),
        };

        let jobs = JobRepository::new(self.db);
        if jobs.insert_if_new(row).await? {
            self.attach_logo(&source_id, &company, lead.logo_url.as_deref())
                .await;

            self.notifier.notify(JobEvent {
                source_id: source_id.clone(),
                company,
                title,
                url: canonical,
                score: scored.score,
            });

            let metric_labels = vec![("source", lead.source.clone())];
            counter!("jobs_inserted_total", &metric_labels).increment(1);
            return Ok(ProcessOutcome::Inserted);
        }

        let metric_labels = vec![("source", lead.source.clone())];
        counter!("jobs_duplicate_total", &metric_labels).increment(1);

        // A duplicate that brings its own logo URL can still fill in a
        // missing logo_key; the backfill guard makes later attempts no-ops.
        if lead
            .logo_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
        {
            self.attach_logo(&source_id, &company, lead.logo_url.as_deref())
                .await;
        }

        Ok(ProcessOutcome::Duplicate)
    }

    /// Resolve a logo and backfill the row. Enrichment failures only cost
    /// the logo; the inserted row and its notification stand.
    async fn attach_logo(&mut self, source_id: &str, company: &str, logo_url: Option<&str>) {
        let key = match self
            .enricher
            .resolve_logo(company, logo_url, &mut self.caches)
            .await
        {
            Ok(key) => key,
            Err(err) => {
                warn!(source_id, error = %err, "Logo enrichment failed");
                return;
            }
        };
        if key.is_empty() {
            return;
        }

        if let Err(err) = JobRepository::new(self.db)
            .backfill_logo_key(source_id, &key)
            .await
        {
            warn!(source_id, error = %err, "Logo backfill failed");
        }
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}
