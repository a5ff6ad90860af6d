//! Scoring and filtering of leads against the configured rule set.

pub mod filter;
pub mod scorer;

pub use filter::{FilterVerdict, REASON_LOCATION, REASON_NO_KEYWORD, should_keep};
pub use scorer::{ScoreResult, score};

/// Case-insensitive substring test used by both the scorer and the filter.
/// Blank terms never match.
pub(crate) fn contains_term(haystack_lower: &str, term: &str) -> bool {
    let needle = term.trim().to_lowercase();
    !needle.is_empty() && haystack_lower.contains(&needle)
}
