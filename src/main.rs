//! # JobScout Main Entry Point
//!
//! Wires configuration, telemetry, storage, and the poll pipeline, then
//! runs either the long-lived service or a single poll cycle.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use jobscout::config::{AppConfig, ConfigLoader, SourcesConfig};
use jobscout::db::init_pool;
use jobscout::fetchers::FetcherRegistry;
use jobscout::limiter::HostLimiter;
use jobscout::mail::ImapConnector;
use jobscout::migration::{Migrator, MigratorTrait};
use jobscout::notify;
use jobscout::poll::{Orchestrator, Poller};
use jobscout::secrets::EnvSecretStore;
use jobscout::server::{AppState, run_server};
use jobscout::telemetry::init_tracing;

#[derive(Parser)]
#[command(name = "jobscout", version, about = "Job posting aggregation service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP surface and the background poller (default)
    Serve,
    /// Run exactly one poll cycle, then exit non-zero if it failed
    PollOnce,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration from layered env files and variables
    let config = ConfigLoader::new().load()?;
    init_tracing(&config)?;

    info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        info!(config = %redacted_json, "Effective configuration");
    }

    let sources = SourcesConfig::load(Path::new(&config.sources_file))?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, sources).await,
        Command::PollOnce => poll_once(config, sources).await,
    }
}

/// Build everything one poll cycle needs, shared by both commands.
async fn build_pipeline(
    config: &AppConfig,
    sources: SourcesConfig,
    shutdown: &CancellationToken,
) -> Result<(DatabaseConnection, Arc<Orchestrator>), Box<dyn std::error::Error>> {
    let db = init_pool(config).await?;
    Migrator::up(&db, None).await?;

    // Workday's bootstrap handshake needs the cookie jar.
    let http = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.http_timeout_seconds))
        .cookie_store(true)
        .build()?;

    let limiter = Arc::new(HostLimiter::new(&config.rate_limit));

    let (notifier, events) = notify::channel(config.notify_capacity);
    tokio::spawn(notify::log_events(
        events,
        sources.scoring.notify_min_score,
    ));

    let registry = FetcherRegistry::from_sources(&sources, Arc::new(ImapConnector));

    let orchestrator = Orchestrator::new(
        db.clone(),
        http,
        limiter,
        Arc::new(EnvSecretStore),
        registry,
        Arc::new(sources),
        config.fetch.clone(),
        notifier,
        shutdown.child_token(),
    );

    Ok((db, Arc::new(orchestrator)))
}

async fn serve(config: AppConfig, sources: SourcesConfig) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = CancellationToken::new();
    let (db, orchestrator) = build_pipeline(&config, sources, &shutdown).await?;

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    let poller_handle = if config.poller.enabled {
        let poller = Poller::new(Arc::clone(&orchestrator), config.poller.clone());
        Some(tokio::spawn(poller.run(shutdown.child_token())))
    } else {
        info!("Background poller disabled; cycles run only via POST /poll");
        None
    };

    let state = AppState::new(db, orchestrator);
    run_server(&config, state, shutdown.clone()).await?;

    shutdown.cancel();
    if let Some(handle) = poller_handle {
        let _ = handle.await;
    }

    Ok(())
}

async fn poll_once(
    config: AppConfig,
    sources: SourcesConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = CancellationToken::new();
    let (_db, orchestrator) = build_pipeline(&config, sources, &shutdown).await?;

    let report = orchestrator.poll_once().await?;
    for source in &report.sources {
        match &source.result {
            Ok(count) => info!(source = source.source, leads = count, "Source fetched"),
            Err(err) => warn!(source = source.source, error = %err, "Source failed"),
        }
    }

    if report.is_ok() {
        info!(
            inserted = report.stats.inserted,
            duplicates = report.stats.duplicates,
            filtered = report.stats.filtered,
            "Poll cycle finished"
        );
        Ok(())
    } else {
        Err(report.error_summary().into())
    }
}
