//! The sources/rules document: which upstreams to poll and how to judge
//! what they return.
//!
//! This lives in a YAML file (path from `JOBSCOUT_SOURCES_FILE`) because it
//! changes far more often than the service's infra knobs, usually by hand.
//! The email password is deliberately absent; it comes from the secret
//! store at fetch time.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Everything the poll cycle needs to know about upstream sources, filters,
/// and scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub lever: CompanySource,
    #[serde(default)]
    pub greenhouse: CompanySource,
    #[serde(default)]
    pub smartrecruiters: CompanySource,
    #[serde(default)]
    pub workday: WorkdaySource,
    #[serde(default)]
    pub email: EmailSource,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// A vendor source addressed by company slugs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanySource {
    #[serde(default)]
    pub enabled: bool,
    /// Vendor-side company identifiers (e.g. the `acme` in
    /// `api.lever.co/v0/postings/acme`).
    #[serde(default)]
    pub companies: Vec<String>,
}

/// Workday is addressed by full board URLs since tenant, site, and region
/// are all baked into them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkdaySource {
    #[serde(default)]
    pub enabled: bool,
    /// Public board URLs, e.g.
    /// `https://acme.wd1.myworkdayjobs.com/en-US/careers`.
    #[serde(default)]
    pub boards: Vec<String>,
}

/// IMAP mailbox holding job-alert emails. Connection credentials only;
/// never the password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailSource {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_imap_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
    /// A message is considered a job alert when its subject contains any of
    /// these (case-insensitive).
    #[serde(default)]
    pub search_subject_any: Vec<String>,
}

impl Default for EmailSource {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: default_imap_port(),
            username: String::new(),
            mailbox: default_mailbox(),
            search_subject_any: Vec::new(),
        }
    }
}

/// Location filtering applied before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Whether remote postings pass the location stage.
    #[serde(default = "default_remote_ok")]
    pub remote_ok: bool,
    /// When non-empty, a non-remote posting must mention one of these.
    #[serde(default)]
    pub locations_allow: Vec<String>,
    /// A posting mentioning any of these is rejected outright.
    #[serde(default)]
    pub locations_block: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            remote_ok: default_remote_ok(),
            locations_allow: Vec::new(),
            locations_block: Vec::new(),
        }
    }
}

/// Ordered scoring rules. Order matters for tag ordering, not for the
/// numeric score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub title_rules: Vec<ScoreRule>,
    #[serde(default)]
    pub keyword_rules: Vec<ScoreRule>,
    #[serde(default)]
    pub penalties: Vec<Penalty>,
    /// Subscribers use this floor to decide which inserted jobs are worth
    /// surfacing; the pipeline itself publishes every insert.
    #[serde(default)]
    pub notify_min_score: i64,
}

/// One positive rule: if any term matches, add `weight` and apply `tag`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreRule {
    pub tag: String,
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub any: Vec<String>,
}

/// One penalty: if any term matches, add `weight` (usually negative). No
/// tag; `reason` only shows up in logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Penalty {
    pub reason: String,
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub any: Vec<String>,
}

fn default_imap_port() -> u16 {
    993
}

fn default_mailbox() -> String {
    "INBOX".to_string()
}

fn default_remote_ok() -> bool {
    true
}

impl SourcesConfig {
    /// Load and validate the document at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::SourcesFileRead {
            path: path.display().to_string(),
            source,
        })?;
        let config: SourcesConfig =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::SourcesFileParse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Whether any source is switched on at all. The poller skips cycles
    /// entirely when nothing is.
    pub fn any_enabled(&self) -> bool {
        self.lever.enabled
            || self.greenhouse.enabled
            || self.smartrecruiters.enabled
            || self.workday.enabled
            || self.email.enabled
    }

    /// Structural validation. Email connection details are deliberately not
    /// checked here: an incomplete email setup fails that source's fetch at
    /// cycle time without taking the whole service down.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, source) in [
            ("lever", &self.lever),
            ("greenhouse", &self.greenhouse),
            ("smartrecruiters", &self.smartrecruiters),
        ] {
            if source.enabled && source.companies.iter().all(|c| c.trim().is_empty()) {
                return Err(ConfigError::EnabledSourceEmpty { source_name: name });
            }
        }

        if self.workday.enabled && self.workday.boards.iter().all(|b| b.trim().is_empty()) {
            return Err(ConfigError::EnabledSourceEmpty {
                source_name: "workday",
            });
        }

        for (group, rules) in [
            ("title", &self.scoring.title_rules),
            ("keyword", &self.scoring.keyword_rules),
        ] {
            for (index, rule) in rules.iter().enumerate() {
                if rule.any.iter().all(|t| t.trim().is_empty()) {
                    return Err(ConfigError::RuleWithoutTerms { group, index });
                }
            }
        }

        for (index, penalty) in self.scoring.penalties.iter().enumerate() {
            if penalty.any.iter().all(|t| t.trim().is_empty()) {
                return Err(ConfigError::RuleWithoutTerms {
                    group: "penalty",
                    index,
                });
            }
        }

        Ok(())
    }
}
