//! Job entity model
//!
//! One row per unique posting. Rows never change after insert except for
//! `logo_key`, which enrichment may fill in once.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;

/// A deduplicated, scored job posting.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    /// Surrogate primary key
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Company name, defaulted to "Unknown" when the source had none
    pub company: String,

    /// Posting title, defaulted to "Job Posting"
    pub title: String,

    /// Normalized location text, defaulted to "Unknown"
    pub location: String,

    /// Remote / Hybrid / Onsite / Unknown
    pub work_mode: String,

    /// Canonical posting URL
    pub url: String,

    /// Rule-based score at insert time
    pub score: i64,

    /// Tags from matched scoring rules, stored as a JSON array of strings
    #[sea_orm(column_type = "Json")]
    pub tags: JsonValue,

    /// When the vendor says the posting went up, if it said
    pub posted_at: Option<DateTimeWithTimeZone>,

    /// When this row was written
    pub received_at: DateTimeWithTimeZone,

    /// Stable dedupe identity; unique across the table
    pub source_id: String,

    /// Label of the fetcher that produced the lead
    pub source: String,

    /// Logo cache key, backfilled once after enrichment
    pub logo_key: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
