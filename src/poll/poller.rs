//! # Background Poller
//!
//! Periodic task that kicks off poll cycles on a jittered interval. The
//! jitter spreads cycles out so several instances restarted together do
//! not hit the same upstreams in lockstep. Overlap control lives in the
//! orchestrator; a tick that lands while a cycle is still running is
//! simply skipped.

use std::sync::Arc;

use rand::Rng;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::config::PollerConfig;

use super::{CycleInProgress, Orchestrator};

/// Background poll loop service.
pub struct Poller {
    orchestrator: Arc<Orchestrator>,
    config: PollerConfig,
}

impl Poller {
    pub fn new(orchestrator: Arc<Orchestrator>, config: PollerConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    /// Run the poll loop until the provided shutdown token fires.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            tick_interval_seconds = self.config.tick_interval_seconds,
            jitter_pct = self.config.jitter_pct,
            "Starting poller"
        );

        loop {
            let delay = Duration::from_secs(
                self.config.tick_interval_seconds + sample_jitter_seconds(&self.config),
            );
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Poller shutdown requested");
                    break;
                }
                _ = sleep(delay) => {
                    self.tick().await;
                }
            }
        }

        info!("Poller stopped");
    }

    /// One tick. The cycle runs on its own task so a panic inside a
    /// fetcher or the processor marks the status record instead of
    /// killing the loop.
    async fn tick(&self) {
        if self.orchestrator.source_count() == 0 {
            debug!("No sources registered; skipping poll tick");
            return;
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let handle = tokio::spawn(async move { orchestrator.poll_once().await });
        match handle.await {
            Ok(Ok(report)) => {
                debug!(
                    ok = report.is_ok(),
                    inserted = report.stats.inserted,
                    duplicates = report.stats.duplicates,
                    filtered = report.stats.filtered,
                    failed = report.stats.failed,
                    "Poll tick completed"
                );
            }
            Ok(Err(CycleInProgress)) => {
                debug!("Previous poll cycle still running; skipping tick");
            }
            Err(join_err) => {
                error!(error = %join_err, "Poll cycle panicked");
                self.orchestrator
                    .status()
                    .finish_err(format!("poll cycle panicked: {join_err}"), 0);
            }
        }
    }
}

fn sample_jitter_seconds(config: &PollerConfig) -> u64 {
    let mut rng = rand::thread_rng();
    compute_jitter_seconds(config, &mut rng)
}

fn compute_jitter_seconds<R: Rng + ?Sized>(config: &PollerConfig, rng: &mut R) -> u64 {
    let pct = config.jitter_pct.clamp(0.0, 1.0);
    let max = (config.tick_interval_seconds as f64 * pct).round() as u64;
    if max == 0 {
        return 0;
    }
    rng.gen_range(0..=max)
}

#[cfg(test)]
mod tests {
    use super::*;

    use migration::{Migrator, MigratorTrait};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use sea_orm::{Database, DatabaseConnection};

    use crate::config::{FetchConfig, RateLimitConfig, SourcesConfig};
    use crate::fetchers::FetcherRegistry;
    use crate::limiter::HostLimiter;
    use crate::notify::{self, JobEvent};
    use crate::secrets::MemorySecretStore;

    fn poller_config(tick_interval_seconds: u64, jitter_pct: f64) -> PollerConfig {
        PollerConfig {
            enabled: true,
            tick_interval_seconds,
            jitter_pct,
        }
    }

    #[test]
    fn jitter_respects_bounds() {
        let config = poller_config(30, 0.1);
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..100 {
            let jitter = compute_jitter_seconds(&config, &mut rng);
            assert!(jitter <= 3);
        }
    }

    #[test]
    fn zero_jitter_pct_disables_jitter() {
        let config = poller_config(30, 0.0);
        let mut rng = StdRng::seed_from_u64(42);
        assert_eq!(compute_jitter_seconds(&config, &mut rng), 0);
    }

    #[test]
    fn jitter_pct_is_clamped_to_one() {
        let config = poller_config(10, 5.0);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            assert!(compute_jitter_seconds(&config, &mut rng) <= 10);
        }
    }

    async fn test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn empty_orchestrator() -> (Arc<Orchestrator>, tokio::sync::mpsc::Receiver<JobEvent>) {
        let db = test_db().await;
        let (notifier, rx) = notify::channel(4);
        let orchestrator = Orchestrator::new(
            db,
            reqwest::Client::new(),
            Arc::new(HostLimiter::new(&RateLimitConfig {
                per_host_rps: 100,
                burst: 100,
            })),
            Arc::new(MemorySecretStore::new(Vec::<(String, String)>::new())),
            FetcherRegistry::new(Vec::new()),
            Arc::new(SourcesConfig::default()),
            FetchConfig::default(),
            notifier,
            CancellationToken::new(),
        );
        (Arc::new(orchestrator), rx)
    }

    #[tokio::test]
    async fn tick_skips_when_nothing_is_registered() {
        let (orchestrator, _rx) = empty_orchestrator().await;
        let poller = Poller::new(Arc::clone(&orchestrator), poller_config(30, 0.0));

        poller.tick().await;

        // The skipped tick never claims the running flag or stamps a run.
        let status = orchestrator.status().snapshot();
        assert!(!status.running);
        assert!(status.last_run_at.is_none());
    }

    #[tokio::test]
    async fn run_stops_when_shutdown_fires() {
        let (orchestrator, _rx) = empty_orchestrator().await;
        let poller = Poller::new(orchestrator, poller_config(3600, 0.0));

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(poller.run(shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poller should stop promptly")
            .unwrap();
    }
}
