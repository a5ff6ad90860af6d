//! # Company Domain Repository
//!
//! Cross-run cache of company → website-domain lookups.

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::error::RepositoryError;
use crate::models::company_domain::{self, Entity as CompanyDomain};

pub struct CompanyDomainRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> CompanyDomainRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Cached domain for a normalized company name, if any.
    pub async fn get(&self, company: &str) -> Result<Option<String>, RepositoryError> {
        let found = CompanyDomain::find()
            .filter(company_domain::Column::Company.eq(company))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(found.map(|model| model.domain))
    }

    /// Insert or refresh a mapping.
    pub async fn upsert(&self, company: &str, domain: &str) -> Result<(), RepositoryError> {
        let active = company_domain::ActiveModel {
            company: Set(company.to_string()),
            domain: Set(domain.to_string()),
            updated_at: Set(Utc::now().into()),
        };

        CompanyDomain::insert(active)
            .on_conflict(
                OnConflict::column(company_domain::Column::Company)
                    .update_columns([
                        company_domain::Column::Domain,
                        company_domain::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    #[tokio::test]
    async fn missing_company_returns_none() {
        let db = test_db().await;
        let repo = CompanyDomainRepository::new(&db);
        assert!(repo.get("acme").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_stores_and_refreshes() {
        let db = test_db().await;
        let repo = CompanyDomainRepository::new(&db);

        repo.upsert("acme", "acme.com").await.unwrap();
        assert_eq!(repo.get("acme").await.unwrap().as_deref(), Some("acme.com"));

        repo.upsert("acme", "acme.io").await.unwrap();
        assert_eq!(repo.get("acme").await.unwrap().as_deref(), Some("acme.io"));
    }
}
