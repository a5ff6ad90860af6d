//! Migration to create the logo_cache table.
//!
//! Content-addressed store for fetched company logos; the key is the
//! sha-256 of the image URL so repeat fetches are free.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LogoCache::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LogoCache::Key)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LogoCache::ContentType).text().not_null())
                    .col(ColumnDef::new(LogoCache::Bytes).blob().not_null())
                    .col(
                        ColumnDef::new(LogoCache::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LogoCache::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LogoCache {
    Table,
    Key,
    ContentType,
    Bytes,
    CreatedAt,
}
