//! # Logo Cache Repository
//!
//! Content-addressed image rows keyed by sha-256 of the source URL.
//! Storing the same key twice is fine; the first write sticks.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};

use crate::error::{RepositoryError, is_unique_violation};
use crate::models::logo::{self, Entity as Logo};

pub struct LogoCacheRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> LogoCacheRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Whether an image is already cached under this key.
    pub async fn contains(&self, key: &str) -> Result<bool, RepositoryError> {
        let count = Logo::find()
            .filter(logo::Column::Key.eq(key))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(count > 0)
    }

    /// Fetch a cached image.
    pub async fn get(&self, key: &str) -> Result<Option<logo::Model>, RepositoryError> {
        Logo::find()
            .filter(logo::Column::Key.eq(key))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Store an image under its key. A concurrent or repeated store of the
    /// same key is a no-op.
    pub async fn store(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), RepositoryError> {
        let active = logo::ActiveModel {
            key: Set(key.to_string()),
            content_type: Set(content_type.to_string()),
            bytes: Set(bytes),
            created_at: Set(Utc::now().into()),
        };

        match active.insert(self.db).await {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Ok(()),
            Err(err) => Err(RepositoryError::database_error(err)),
        }
    }
}
