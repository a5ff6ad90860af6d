//! Logo cache entity model
//!
//! Content-addressed store of fetched company logos. The key is the
//! sha-256 of the image URL.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "logo_cache")]
pub struct Model {
    /// sha-256 hex of the source image URL (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,

    /// Content type reported by the image host
    pub content_type: String,

    /// Raw image bytes, capped at fetch time
    pub bytes: Vec<u8>,

    /// When the image was first cached
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
