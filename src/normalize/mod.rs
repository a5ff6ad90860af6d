//! Text normalization applied to leads before scoring and persistence.
//!
//! Everything here is pure: whitespace cleanup, location tidying, and
//! work-mode inference from free text. Fetchers hand in whatever the
//! upstream produced; these helpers make it comparable across sources.

use std::fmt;

pub mod url;

pub use url::canonical_url;

/// How a posting expects people to work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkMode {
    Remote,
    Hybrid,
    Onsite,
    Unknown,
}

impl WorkMode {
    /// Canonical label stored on the job row.
    pub const fn as_str(self) -> &'static str {
        match self {
            WorkMode::Remote => "Remote",
            WorkMode::Hybrid => "Hybrid",
            WorkMode::Onsite => "Onsite",
            WorkMode::Unknown => "Unknown",
        }
    }

    /// Parse a label back into a mode; anything unrecognized is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "remote" => WorkMode::Remote,
            "hybrid" => WorkMode::Hybrid,
            "onsite" | "on-site" => WorkMode::Onsite,
            _ => WorkMode::Unknown,
        }
    }
}

impl fmt::Display for WorkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collapse runs of whitespace (including newlines) to single spaces and
/// trim the ends.
pub fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tidy a free-text location into something comparable across sources.
///
/// Strips a leading "Location:" label, unwraps "Greater X Area" phrasing,
/// and trims stray separator characters that email scrapes leave behind.
pub fn normalize_location(input: &str) -> String {
    const LABEL: &str = "location:";
    const GREATER: &str = "greater ";
    const AREA: &str = " area";

    let mut loc = clean_text(input);

    if loc
        .get(..LABEL.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(LABEL))
    {
        loc = loc[LABEL.len()..].trim().to_string();
    }

    if loc.len() > GREATER.len() + AREA.len()
        && loc
            .get(..GREATER.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(GREATER))
        && loc
            .get(loc.len() - AREA.len()..)
            .is_some_and(|s| s.eq_ignore_ascii_case(AREA))
    {
        loc = loc[GREATER.len()..loc.len() - AREA.len()].trim().to_string();
    }

    loc.trim_matches(|c: char| c.is_whitespace() || matches!(c, '·' | '|' | ',' | '-'))
        .to_string()
}

/// Infer a work mode from free text (location, title, or description).
///
/// Hybrid outranks remote so "Remote/Hybrid" postings land on the stricter
/// reading.
pub fn infer_work_mode(text: &str) -> WorkMode {
    let lower = text.to_lowercase();
    if lower.contains("hybrid") {
        WorkMode::Hybrid
    } else if lower.contains("remote") {
        WorkMode::Remote
    } else if lower.contains("on-site") || lower.contains("onsite") {
        WorkMode::Onsite
    } else {
        WorkMode::Unknown
    }
}
