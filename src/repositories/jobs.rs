//! # Job Repository
//!
//! Idempotent writes to the jobs table. The unique `source_id` index does
//! the dedupe; this layer turns the resulting constraint violation into a
//! calm `Ok(false)` so re-polling the same postings costs nothing.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde_json::Value as JsonValue;

use crate::error::{RepositoryError, is_unique_violation};
use crate::models::job::{self, Entity as Job};

/// Insert payload for one job row. `received_at` is stamped here, not by
/// callers.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub company: String,
    pub title: String,
    pub location: String,
    pub work_mode: String,
    pub url: String,
    pub score: i64,
    pub tags: Vec<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub source_id: String,
    pub source: String,
}

/// Repository for job row operations.
pub struct JobRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> JobRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a row unless one with the same `source_id` already exists.
    ///
    /// Returns `Ok(true)` on a fresh insert and `Ok(false)` on a duplicate;
    /// the existing row is left exactly as it was.
    pub async fn insert_if_new(&self, row: NewJob) -> Result<bool, RepositoryError> {
        let active = job::ActiveModel {
            company: Set(row.company),
            title: Set(row.title),
            location: Set(row.location),
            work_mode: Set(row.work_mode),
            url: Set(row.url),
            score: Set(row.score),
            tags: Set(JsonValue::from(row.tags)),
            posted_at: Set(row.posted_at.map(Into::into)),
            received_at: Set(Utc::now().into()),
            source_id: Set(row.source_id),
            source: Set(row.source),
            logo_key: Set(None),
            ..Default::default()
        };

        match active.insert(self.db).await {
            Ok(_) => Ok(true),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(RepositoryError::database_error(err)),
        }
    }

    /// Fill in `logo_key` for a row that does not have one yet.
    ///
    /// The guard lives in the WHERE clause, so whichever enrichment attempt
    /// lands first wins and later ones change nothing.
    pub async fn backfill_logo_key(
        &self,
        source_id: &str,
        logo_key: &str,
    ) -> Result<(), RepositoryError> {
        Job::update_many()
            .col_expr(job::Column::LogoKey, Expr::value(logo_key))
            .filter(job::Column::SourceId.eq(source_id))
            .filter(
                Condition::any()
                    .add(job::Column::LogoKey.is_null())
                    .add(job::Column::LogoKey.eq("")),
            )
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(())
    }

    /// Look up a row by its dedupe identity.
    pub async fn find_by_source_id(
        &self,
        source_id: &str,
    ) -> Result<Option<job::Model>, RepositoryError> {
        Job::find()
            .filter(job::Column::SourceId.eq(source_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
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

    fn sample_row() -> NewJob {
        NewJob {
            company: "Acme".into(),
            title: "Backend Engineer".into(),
            location: "Berlin".into(),
            work_mode: "Remote".into(),
            url: "https://example.com/jobs/1".into(),
            score: 12,
            tags: vec!["backend".into(), "rust".into()],
            posted_at: None,
            source_id: "lever:acme:1".into(),
            source: "lever".into(),
        }
    }

    #[tokio::test]
    async fn duplicate_insert_reports_false_and_keeps_first_row() {
        let db = test_db().await;
        let repo = JobRepository::new(&db);

        assert!(repo.insert_if_new(sample_row()).await.unwrap());

        let mut second = sample_row();
        second.title = "Different Title".into();
        second.score = 99;
        assert!(!repo.insert_if_new(second).await.unwrap());

        let stored = repo
            .find_by_source_id("lever:acme:1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.title, "Backend Engineer");
        assert_eq!(stored.score, 12);
        assert_eq!(
            stored.tags,
            serde_json::json!(["backend", "rust"]),
        );
    }

    #[tokio::test]
    async fn logo_key_backfills_only_once() {
        let db = test_db().await;
        let repo = JobRepository::new(&db);
        repo.insert_if_new(sample_row()).await.unwrap();

        repo.backfill_logo_key("lever:acme:1", "cafe01").await.unwrap();
        let stored = repo
            .find_by_source_id("lever:acme:1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.logo_key.as_deref(), Some("cafe01"));

        // A later attempt with a different key is a no-op.
        repo.backfill_logo_key("lever:acme:1", "beef02").await.unwrap();
        let stored = repo
            .find_by_source_id("lever:acme:1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.logo_key.as_deref(), Some("cafe01"));
    }

    #[tokio::test]
    async fn backfill_on_unknown_source_id_is_a_no_op() {
        let db = test_db().await;
        let repo = JobRepository::new(&db);
        repo.backfill_logo_key("missing", "cafe01").await.unwrap();
        assert!(repo.find_by_source_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn distinct_source_ids_both_insert() {
        let db = test_db().await;
        let repo = JobRepository::new(&db);

        assert!(repo.insert_if_new(sample_row()).await.unwrap());
        let mut other = sample_row();
        other.source_id = "lever:acme:2".into();
        other.url = "https://example.com/jobs/2".into();
        assert!(repo.insert_if_new(other).await.unwrap());
    }
}
