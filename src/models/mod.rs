//! # Data Models
//!
//! SeaORM entity models for the persisted tables.

use serde::{Deserialize, Serialize};

pub mod company_domain;
pub mod job;
pub mod logo;

pub use company_domain::Entity as CompanyDomain;
pub use job::Entity as Job;
pub use logo::Entity as Logo;

/// Basic service information returned by the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "jobscout".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
