//! Migration to create the jobs table.
//!
//! Rows are append-only: every column is fixed at insert time except
//! `logo_key`, which may be backfilled once after enrichment. Dedupe across
//! poll cycles rides on the unique `source_id` index.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Jobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Jobs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Jobs::Company).text().not_null())
                    .col(ColumnDef::new(Jobs::Title).text().not_null())
                    .col(ColumnDef::new(Jobs::Location).text().not_null())
                    .col(ColumnDef::new(Jobs::WorkMode).text().not_null())
                    .col(ColumnDef::new(Jobs::Url).text().not_null())
                    .col(
                        ColumnDef::new(Jobs::Score)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Jobs::Tags).json().not_null())
                    .col(ColumnDef::new(Jobs::PostedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Jobs::ReceivedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Jobs::SourceId).text().not_null())
                    .col(ColumnDef::new(Jobs::Source).text().not_null())
                    .col(ColumnDef::new(Jobs::LogoKey).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_jobs_source_id")
                    .table(Jobs::Table)
                    .col(Jobs::SourceId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_received_at")
                    .table(Jobs::Table)
                    .col(Jobs::ReceivedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_jobs_received_at").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("uq_jobs_source_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Jobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Jobs {
    Table,
    Id,
    Company,
    Title,
    Location,
    WorkMode,
    Url,
    Score,
    Tags,
    PostedAt,
    ReceivedAt,
    SourceId,
    Source,
    LogoKey,
}
