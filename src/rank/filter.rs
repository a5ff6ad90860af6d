//! Two-stage lead filtering ahead of scoring.
//!
//! Stage one judges location (block list first, then remote handling, then
//! the allow list); stage two requires at least one configured keyword to
//! appear. Rejections carry a machine-readable reason so skip logs and
//! metrics can aggregate on it.

use crate::config::{FilterConfig, ScoringConfig};

use super::contains_term;

/// Rejected in the location stage.
pub const REASON_LOCATION: &str = "location";
/// Rejected because no scoring keyword appears in the text.
pub const REASON_NO_KEYWORD: &str = "no_keyword_match";

/// Outcome of filtering one lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterVerdict {
    pub keep: bool,
    pub reason: Option<&'static str>,
}

impl FilterVerdict {
    pub fn keep() -> Self {
        Self {
            keep: true,
            reason: None,
        }
    }

    pub fn reject(reason: &'static str) -> Self {
        Self {
            keep: false,
            reason: Some(reason),
        }
    }
}

/// Decide whether a lead survives filtering.
///
/// The block list is checked across location, title, and description and
/// always wins, even over an allow-list hit. Remote postings pass the
/// location stage only when `remote_ok`; non-remote postings must match the
/// allow list when one is configured. The keyword stage passes vacuously
/// when no rules are configured at all.
pub fn should_keep(
    title: &str,
    location: &str,
    description: &str,
    filters: &FilterConfig,
    scoring: &ScoringConfig,
) -> FilterVerdict {
    let haystack = format!("{} {} {}", location, title, description).to_lowercase();

    for term in &filters.locations_block {
        if contains_term(&haystack, term) {
            return FilterVerdict::reject(REASON_LOCATION);
        }
    }

    if haystack.contains("remote") {
        if !filters.remote_ok {
            return FilterVerdict::reject(REASON_LOCATION);
        }
    } else if !filters.locations_allow.is_empty()
        && !filters
            .locations_allow
            .iter()
            .any(|term| contains_term(&haystack, term))
    {
        return FilterVerdict::reject(REASON_LOCATION);
    }

    let text = format!("{} {}", title, description).to_lowercase();
    let mut has_terms = false;
    for term in scoring
        .title_rules
        .iter()
        .chain(&scoring.keyword_rules)
        .flat_map(|rule| rule.any.iter())
    {
        if term.trim().is_empty() {
            continue;
        }
        has_terms = true;
        if contains_term(&text, term) {
            return FilterVerdict::keep();
        }
    }

    if has_terms {
        FilterVerdict::reject(REASON_NO_KEYWORD)
    } else {
        FilterVerdict::keep()
    }
}
