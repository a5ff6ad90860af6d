//! Migration to create the company_domains table.
//!
//! Maps a normalized company name to the company's website domain so the
//! enrichment step only hits the live search endpoint once per company.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CompanyDomains::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CompanyDomains::Company)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CompanyDomains::Domain).text().not_null())
                    .col(
                        ColumnDef::new(CompanyDomains::UpdatedAt)
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
            .drop_table(Table::drop().table(CompanyDomains::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CompanyDomains {
    Table,
    Company,
    Domain,
    UpdatedAt,
}
