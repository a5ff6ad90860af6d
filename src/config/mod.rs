//! Configuration loading for the jobscout service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `JOBSCOUT_`, producing a typed [`AppConfig`]. The sources/rules document
//! (which companies to poll, scoring rules, filters) is a separate YAML file
//! handled by [`sources`]; this module only knows its path.

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod sources;

pub use sources::{
    CompanySource, EmailSource, FilterConfig, Penalty, ScoreRule, ScoringConfig, SourcesConfig,
    WorkdaySource,
};

/// Application configuration derived from `JOBSCOUT_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    /// Path to the YAML sources/rules document.
    #[serde(default = "default_sources_file")]
    pub sources_file: String,
    /// Per-request HTTP timeout for upstream calls.
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
    /// User agent sent to public job boards. Some of them gate on it.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Capacity of the job notification channel; events beyond it are
    /// dropped rather than blocking the pipeline.
    #[serde(default = "default_notify_capacity")]
    pub notify_capacity: usize,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Background poller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PollerConfig {
    /// Whether the background poll loop runs at all.
    ///
    /// Environment variable: `JOBSCOUT_POLLER_ENABLED`
    #[serde(default = "default_poller_enabled")]
    pub enabled: bool,

    /// Seconds between poll-cycle attempts (default: 30).
    ///
    /// Environment variable: `JOBSCOUT_POLLER_TICK_INTERVAL_SECONDS`
    #[serde(default = "default_poller_tick_interval_seconds")]
    pub tick_interval_seconds: u64,

    /// Fractional jitter applied to each tick (default: 0.1, range 0.0-1.0)
    /// so restarts of several instances don't line up their cycles.
    ///
    /// Environment variable: `JOBSCOUT_POLLER_JITTER_PCT`
    #[serde(default = "default_poller_jitter_pct")]
    pub jitter_pct: f64,
}

/// Timeout and concurrency knobs for the fetch/process pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct FetchConfig {
    /// Deadline for one ATS source's whole fetch (default: 300s).
    ///
    /// Environment variable: `JOBSCOUT_FETCH_ATS_TIMEOUT_SECONDS`
    #[serde(default = "default_fetch_ats_timeout_seconds")]
    pub ats_timeout_seconds: u64,

    /// Deadline for the email source's whole fetch (default: 120s).
    ///
    /// Environment variable: `JOBSCOUT_FETCH_EMAIL_TIMEOUT_SECONDS`
    #[serde(default = "default_fetch_email_timeout_seconds")]
    pub email_timeout_seconds: u64,

    /// Deadline for fetching one company inside a source (default: 15s).
    /// Must stay below both source deadlines.
    ///
    /// Environment variable: `JOBSCOUT_FETCH_COMPANY_TIMEOUT_SECONDS`
    #[serde(default = "default_fetch_company_timeout_seconds")]
    pub company_timeout_seconds: u64,

    /// Deadline for the persistence/enrichment phase of one cycle
    /// (default: 120s).
    ///
    /// Environment variable: `JOBSCOUT_FETCH_INSERT_TIMEOUT_SECONDS`
    #[serde(default = "default_fetch_insert_timeout_seconds")]
    pub insert_timeout_seconds: u64,

    /// Concurrent per-company workers inside one source (default: 8).
    ///
    /// Environment variable: `JOBSCOUT_FETCH_WORKERS`
    #[serde(default = "default_fetch_workers")]
    pub workers: usize,
}

/// Per-host token-bucket limits applied to all outbound HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RateLimitConfig {
    /// Sustained requests per second per hostname (default: 2).
    ///
    /// Environment variable: `JOBSCOUT_RATE_LIMIT_PER_HOST_RPS`
    #[serde(default = "default_rate_limit_per_host_rps")]
    pub per_host_rps: u32,

    /// Burst allowance per hostname (default: 4).
    ///
    /// Environment variable: `JOBSCOUT_RATE_LIMIT_BURST`
    #[serde(default = "default_rate_limit_burst")]
    pub burst: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            sources_file: default_sources_file(),
            http_timeout_seconds: default_http_timeout_seconds(),
            user_agent: default_user_agent(),
            notify_capacity: default_notify_capacity(),
            poller: PollerConfig::default(),
            fetch: FetchConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: default_poller_enabled(),
            tick_interval_seconds: default_poller_tick_interval_seconds(),
            jitter_pct: default_poller_jitter_pct(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            ats_timeout_seconds: default_fetch_ats_timeout_seconds(),
            email_timeout_seconds: default_fetch_email_timeout_seconds(),
            company_timeout_seconds: default_fetch_company_timeout_seconds(),
            insert_timeout_seconds: default_fetch_insert_timeout_seconds(),
            workers: default_fetch_workers(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_host_rps: default_rate_limit_per_host_rps(),
            burst: default_rate_limit_burst(),
        }
    }
}

impl PollerConfig {
    /// Validate poller configuration bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_seconds < 5 || self.tick_interval_seconds > 3600 {
            return Err(ConfigError::InvalidPollerTickInterval {
                value: self.tick_interval_seconds,
            });
        }

        if !(0.0..=1.0).contains(&self.jitter_pct) {
            return Err(ConfigError::InvalidPollerJitter {
                value: self.jitter_pct,
            });
        }

        Ok(())
    }
}

impl FetchConfig {
    /// Validate timeout layering and worker bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("ats_timeout_seconds", self.ats_timeout_seconds),
            ("email_timeout_seconds", self.email_timeout_seconds),
            ("company_timeout_seconds", self.company_timeout_seconds),
            ("insert_timeout_seconds", self.insert_timeout_seconds),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidFetchTimeout { field, value });
            }
        }

        let source_floor = self.ats_timeout_seconds.min(self.email_timeout_seconds);
        if self.company_timeout_seconds >= source_floor {
            return Err(ConfigError::CompanyTimeoutTooLarge {
                company: self.company_timeout_seconds,
                source_timeout: source_floor,
            });
        }

        if self.workers == 0 || self.workers > 64 {
            return Err(ConfigError::InvalidFetchWorkers {
                value: self.workers,
            });
        }

        Ok(())
    }
}

impl RateLimitConfig {
    /// Validate rate limit bounds. Zero is rejected because a token bucket
    /// with no refill would stall every fetcher forever.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.per_host_rps == 0 {
            return Err(ConfigError::InvalidRateLimit {
                field: "per_host_rps",
                value: self.per_host_rps,
            });
        }

        if self.burst == 0 {
            return Err(ConfigError::InvalidRateLimit {
                field: "burst",
                value: self.burst,
            });
        }

        Ok(())
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Returns a JSON representation safe for startup logging. The database
    /// URL is redacted when it embeds credentials.
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.database_url.contains('@') {
            config.database_url = "[REDACTED]".to_string();
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if settings are
    /// missing or out of bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        if self.sources_file.trim().is_empty() {
            return Err(ConfigError::MissingSourcesFile);
        }

        if self.http_timeout_seconds == 0 {
            return Err(ConfigError::InvalidFetchTimeout {
                field: "http_timeout_seconds",
                value: self.http_timeout_seconds,
            });
        }

        self.poller.validate()?;
        self.fetch.validate()?;
        self.rate_limit.validate()?;

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_database_url() -> String {
    "sqlite://jobscout.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    5
}

fn default_db_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_sources_file() -> String {
    "sources.yaml".to_string()
}

fn default_http_timeout_seconds() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
        .to_string()
}

fn default_notify_capacity() -> usize {
    256
}

fn default_poller_enabled() -> bool {
    true
}

fn default_poller_tick_interval_seconds() -> u64 {
    30
}

fn default_poller_jitter_pct() -> f64 {
    0.1
}

fn default_fetch_ats_timeout_seconds() -> u64 {
    300
}

fn default_fetch_email_timeout_seconds() -> u64 {
    120
}

fn default_fetch_company_timeout_seconds() -> u64 {
    15
}

fn default_fetch_insert_timeout_seconds() -> u64 {
    120
}

fn default_fetch_workers() -> usize {
    8
}

fn default_rate_limit_per_host_rps() -> u32 {
    2
}

fn default_rate_limit_burst() -> u32 {
    4
}

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read env file {path}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("invalid api bind address '{value}'")]
    InvalidBindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("JOBSCOUT_DATABASE_URL must not be empty")]
    MissingDatabaseUrl,

    #[error("JOBSCOUT_SOURCES_FILE must not be empty")]
    MissingSourcesFile,

    #[error("poller tick interval {value}s out of bounds (5..=3600)")]
    InvalidPollerTickInterval { value: u64 },

    #[error("poller jitter {value} out of bounds (0.0..=1.0)")]
    InvalidPollerJitter { value: f64 },

    #[error("fetch timeout {field} must be positive, got {value}")]
    InvalidFetchTimeout { field: &'static str, value: u64 },

    #[error("company timeout {company}s must stay below the source timeout {source_timeout}s")]
    CompanyTimeoutTooLarge { company: u64, source_timeout: u64 },

    #[error("fetch workers {value} out of bounds (1..=64)")]
    InvalidFetchWorkers { value: usize },

    #[error("rate limit {field} must be positive, got {value}")]
    InvalidRateLimit { field: &'static str, value: u32 },

    #[error("failed to read sources file {path}")]
    SourcesFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sources file {path}")]
    SourcesFileParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("source '{source_name}' is enabled but lists nothing to poll")]
    EnabledSourceEmpty { source_name: &'static str },

    #[error("{group} rule #{index} has an empty 'any' term list")]
    RuleWithoutTerms { group: &'static str, index: usize },
}

/// Loads configuration using layered `.env` files and `JOBSCOUT_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads configuration: `.env` layers first, process environment last.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix("JOBSCOUT_") {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = layered
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or(profile_hint);
        let api_bind_addr = layered
            .remove("API_BIND_ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_api_bind_addr);
        let log_level = layered
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_format);
        let database_url = layered
            .remove("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_database_url);
        let db_max_connections = layered
            .remove("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = layered
            .remove("DB_ACQUIRE_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_acquire_timeout_ms);
        let sources_file = layered
            .remove("SOURCES_FILE")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_sources_file);
        let http_timeout_seconds = layered
            .remove("HTTP_TIMEOUT_SECONDS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_http_timeout_seconds);
        let user_agent = layered
            .remove("USER_AGENT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_user_agent);
        let notify_capacity = layered
            .remove("NOTIFY_CAPACITY")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_notify_capacity);

        let poller = PollerConfig {
            enabled: layered
                .remove("POLLER_ENABLED")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_poller_enabled),
            tick_interval_seconds: layered
                .remove("POLLER_TICK_INTERVAL_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_poller_tick_interval_seconds),
            jitter_pct: layered
                .remove("POLLER_JITTER_PCT")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_poller_jitter_pct),
        };

        let fetch = FetchConfig {
            ats_timeout_seconds: layered
                .remove("FETCH_ATS_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_fetch_ats_timeout_seconds),
            email_timeout_seconds: layered
                .remove("FETCH_EMAIL_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_fetch_email_timeout_seconds),
            company_timeout_seconds: layered
                .remove("FETCH_COMPANY_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_fetch_company_timeout_seconds),
            insert_timeout_seconds: layered
                .remove("FETCH_INSERT_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_fetch_insert_timeout_seconds),
            workers: layered
                .remove("FETCH_WORKERS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_fetch_workers),
        };

        let rate_limit = RateLimitConfig {
            per_host_rps: layered
                .remove("RATE_LIMIT_PER_HOST_RPS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_rate_limit_per_host_rps),
            burst: layered
                .remove("RATE_LIMIT_BURST")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_rate_limit_burst),
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            sources_file,
            http_timeout_seconds,
            user_agent,
            notify_capacity,
            poller,
            fetch,
            rate_limit,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("JOBSCOUT_PROFILE")
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix("JOBSCOUT_") {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        AppConfig::default().validate().unwrap();
        AppConfig::default().bind_addr().unwrap();
    }

    #[test]
    fn company_timeout_must_stay_below_source_timeouts() {
        let mut cfg = AppConfig::default();
        cfg.fetch.company_timeout_seconds = cfg.fetch.email_timeout_seconds;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::CompanyTimeoutTooLarge { .. }));
    }

    #[test]
    fn zero_rate_limit_rejected() {
        let mut cfg = AppConfig::default();
        cfg.rate_limit.per_host_rps = 0;
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::InvalidRateLimit {
                field: "per_host_rps",
                ..
            }
        ));
    }

    #[test]
    fn poller_bounds_enforced() {
        let mut cfg = AppConfig::default();
        cfg.poller.tick_interval_seconds = 2;
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::InvalidPollerTickInterval { value: 2 }
        ));

        let mut cfg = AppConfig::default();
        cfg.poller.jitter_pct = 1.5;
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::InvalidPollerJitter { .. }
        ));
    }

    #[test]
    fn redacted_json_hides_credentialed_urls() {
        let mut cfg = AppConfig::default();
        cfg.database_url = "postgres://user:secret@db/jobs".to_string();
        let json = cfg.redacted_json().unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("[REDACTED]"));

        let cfg = AppConfig::default();
        let json = cfg.redacted_json().unwrap();
        assert!(json.contains("sqlite://jobscout.db"));
    }
}
