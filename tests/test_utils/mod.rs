//! Shared fixtures for integration tests: in-memory databases and fully
//! wired poll pipelines with every external endpoint overridable.

use std::sync::Arc;

use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use reqwest::StatusCode;
use sea_orm::{Database, DatabaseConnection};
use tokio_util::sync::CancellationToken;

use jobscout::config::{FetchConfig, RateLimitConfig, SourcesConfig};
use jobscout::error::FetchError;
use jobscout::fetchers::{FetchBatch, FetchContext, Fetcher, FetcherRegistry, Lead};
use jobscout::limiter::HostLimiter;
use jobscout::notify::{self, JobEvent};
use jobscout::poll::Orchestrator;
use jobscout::secrets::MemorySecretStore;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Parse a sources/rules document from inline YAML.
#[allow(dead_code)]
pub fn sources_from_yaml(yaml: &str) -> SourcesConfig {
    serde_yaml::from_str(yaml).expect("test sources yaml should parse")
}

/// Enrichment endpoints on a closed port, so pipelines under test fail
/// their logo lookups fast without touching the network.
#[allow(dead_code)]
pub fn offline_enrich_bases() -> (String, String) {
    (
        "http://127.0.0.1:1/html/".to_string(),
        "http://127.0.0.1:1/favicons".to_string(),
    )
}

/// A fetcher that hands back a canned batch, for scenarios where the
/// vendor protocol is not the part under test.
#[allow(dead_code)]
pub struct StaticFetcher {
    pub name: &'static str,
    pub leads: Vec<Lead>,
}

#[async_trait::async_trait]
impl Fetcher for StaticFetcher {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, _ctx: &FetchContext) -> Result<FetchBatch, FetchError> {
        Ok(FetchBatch {
            source: self.name.to_string(),
            leads: self.leads.clone(),
        })
    }
}

/// A fetcher whose source is down.
#[allow(dead_code)]
pub struct FailingFetcher;

#[async_trait::async_trait]
impl Fetcher for FailingFetcher {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn fetch(&self, _ctx: &FetchContext) -> Result<FetchBatch, FetchError> {
        Err(FetchError::http(
            StatusCode::SERVICE_UNAVAILABLE,
            "upstream down",
        ))
    }
}

/// Wire a full orchestrator around the given fetchers.
#[allow(dead_code)]
pub fn build_orchestrator(
    db: &DatabaseConnection,
    fetchers: Vec<Arc<dyn Fetcher>>,
    sources: SourcesConfig,
    enrich_bases: (String, String),
) -> (Arc<Orchestrator>, tokio::sync::mpsc::Receiver<JobEvent>) {
    let (notifier, events) = notify::channel(64);
    let orchestrator = Orchestrator::new(
        db.clone(),
        reqwest::Client::new(),
        Arc::new(HostLimiter::new(&RateLimitConfig {
            per_host_rps: 100,
            burst: 100,
        })),
        Arc::new(MemorySecretStore::new(Vec::<(String, String)>::new())),
        FetcherRegistry::new(fetchers),
        Arc::new(sources),
        FetchConfig::default(),
        notifier,
        CancellationToken::new(),
    )
    .with_enrich_bases(enrich_bases.0, enrich_bases.1);
    (Arc::new(orchestrator), events)
}
