//! # Repository Layer
//!
//! Repositories encapsulate all SeaORM operations on the persisted tables.
//! Nothing above this layer builds queries.

pub mod company_domains;
pub mod jobs;
pub mod logo_cache;

pub use company_domains::CompanyDomainRepository;
pub use jobs::{JobRepository, NewJob};
pub use logo_cache::LogoCacheRepository;
