//! Fetchers module
//!
//! One fetcher per upstream source, all behind the `Fetcher` trait:
//! - ATS vendors polled over HTTP (Lever, Greenhouse, SmartRecruiters,
//!   Workday)
//! - an IMAP mailbox of LinkedIn job-alert emails
//!
//! Fetchers only collect leads; filtering, scoring, and persistence happen
//! in the processing stage.

pub mod email;
pub mod greenhouse;
pub mod lever;
pub mod linkedin_alert;
pub mod registry;
pub mod smartrecruiters;
pub mod trait_;
pub mod workday;

pub use registry::FetcherRegistry;
pub use trait_::{FetchBatch, FetchContext, Fetcher, Lead};

pub use email::{EMAIL_SOURCE, EmailFetcher};
pub use greenhouse::{GREENHOUSE_SOURCE, GreenhouseFetcher};
pub use lever::{LEVER_SOURCE, LeverFetcher};
pub use smartrecruiters::{SMARTRECRUITERS_SOURCE, SmartRecruitersFetcher};
pub use workday::{WORKDAY_SOURCE, WorkdayFetcher};
