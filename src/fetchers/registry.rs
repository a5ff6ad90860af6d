//! Fetcher registry
//!
//! Builds the set of enabled fetchers out of the sources document. The
//! registry is a plain value owned by the orchestrator; nothing global.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::SourcesConfig;
use crate::mail::MailConnector;

use super::email::EmailFetcher;
use super::greenhouse::GreenhouseFetcher;
use super::lever::LeverFetcher;
use super::smartrecruiters::SmartRecruitersFetcher;
use super::trait_::Fetcher;
use super::workday::WorkdayFetcher;

/// The enabled fetchers for this process, in registration order.
pub struct FetcherRegistry {
    fetchers: Vec<Arc<dyn Fetcher>>,
}

impl FetcherRegistry {
    pub fn new(fetchers: Vec<Arc<dyn Fetcher>>) -> Self {
        if fetchers.is_empty() {
            warn!("No sources enabled; poll cycles will produce nothing");
        } else {
            let names: Vec<&str> = fetchers.iter().map(|f| f.name()).collect();
            info!(sources = ?names, "Registered fetchers");
        }

        Self { fetchers }
    }

    /// Instantiate a fetcher per enabled source.
    pub fn from_sources(sources: &SourcesConfig, mail: Arc<dyn MailConnector>) -> Self {
        let mut fetchers: Vec<Arc<dyn Fetcher>> = Vec::new();

        if sources.lever.enabled {
            fetchers.push(Arc::new(LeverFetcher::new(&sources.lever)));
        }
        if sources.greenhouse.enabled {
            fetchers.push(Arc::new(GreenhouseFetcher::new(&sources.greenhouse)));
        }
        if sources.smartrecruiters.enabled {
            fetchers.push(Arc::new(SmartRecruitersFetcher::new(
                &sources.smartrecruiters,
            )));
        }
        if sources.workday.enabled {
            fetchers.push(Arc::new(WorkdayFetcher::new(&sources.workday)));
        }
        if sources.email.enabled {
            fetchers.push(Arc::new(EmailFetcher::new(&sources.email, mail)));
        }

        Self::new(fetchers)
    }

    pub fn fetchers(&self) -> &[Arc<dyn Fetcher>] {
        &self.fetchers
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.fetchers.iter().map(|f| f.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }
}
