//! # JobScout Library
//!
//! Core functionality for the JobScout service: source fetchers, lead
//! filtering and scoring, idempotent persistence with enrichment, the poll
//! orchestration layer, and the thin HTTP surface over it.

pub mod config;
pub mod db;
pub mod error;
pub mod fetchers;
pub mod identity;
pub mod limiter;
pub mod mail;
pub mod models;
pub mod normalize;
pub mod notify;
pub mod poll;
pub mod process;
pub mod rank;
pub mod repositories;
pub mod secrets;
pub mod server;
pub mod telemetry;
pub use migration;
