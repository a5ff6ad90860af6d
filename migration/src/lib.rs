//! Database migrations for the jobscout service.
//!
//! All schema changes go through SeaORM Migration; the service itself never
//! issues DDL.

pub use sea_orm_migration::prelude::*;

mod m2026_07_10_120000_create_jobs;
mod m2026_07_10_120100_create_company_domains;
mod m2026_07_10_120200_create_logo_cache;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_07_10_120000_create_jobs::Migration),
            Box::new(m2026_07_10_120100_create_company_domains::Migration),
            Box::new(m2026_07_10_120200_create_logo_cache::Migration),
        ]
    }
}
