//! Company domain cache entity model
//!
//! Persists the company → website-domain mapping discovered by enrichment,
//! so live lookups happen at most once per company across runs.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "company_domains")]
pub struct Model {
    /// Normalized company name (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub company: String,

    /// Discovered website domain, e.g. "acme.com"
    pub domain: String,

    /// Last time the mapping was written
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
