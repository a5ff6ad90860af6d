//! Rule-based lead scoring.
//!
//! Deliberately dumb: lowercase substring matching against configured term
//! lists, summed weights, tags collected in rule order. Deterministic for a
//! given (text, rules) pair and safe to call from any task.

use crate::config::ScoringConfig;

use super::contains_term;

/// Outcome of scoring one lead.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScoreResult {
    pub score: i64,
    /// Tags from matched rules, first-match order, deduplicated.
    pub tags: Vec<String>,
}

/// Score a lead's text against the configured rules.
///
/// Each rule fires at most once no matter how many of its terms appear.
/// Title rules and keyword rules contribute weight and a tag; penalties
/// contribute weight only.
pub fn score(title: &str, description: &str, scoring: &ScoringConfig) -> ScoreResult {
    let text = format!("{} {}", title, description).to_lowercase();

    let mut result = ScoreResult::default();

    for rule in scoring.title_rules.iter().chain(&scoring.keyword_rules) {
        if rule.any.iter().any(|term| contains_term(&text, term)) {
            result.score += rule.weight;
            if !rule.tag.is_empty() && !result.tags.iter().any(|t| t == &rule.tag) {
                result.tags.push(rule.tag.clone());
            }
        }
    }

    for penalty in &scoring.penalties {
        if penalty.any.iter().any(|term| contains_term(&text, term)) {
            result.score += penalty.weight;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Penalty, ScoreRule};

    fn rules() -> ScoringConfig {
        ScoringConfig {
            title_rules: vec![ScoreRule {
                tag: "backend".into(),
                weight: 10,
                any: vec!["backend".into(), "back end".into()],
            }],
            keyword_rules: vec![
                ScoreRule {
                    tag: "rust".into(),
                    weight: 5,
                    any: vec!["rust".into()],
                },
                ScoreRule {
                    tag: "backend".into(),
                    weight: 3,
                    any: vec!["api".into()],
                },
            ],
            penalties: vec![Penalty {
                reason: "agency".into(),
                weight: -8,
                any: vec!["staffing agency".into(), "recruiting firm".into()],
            }],
            notify_min_score: 0,
        }
    }

    #[test]
    fn weights_add_across_rules() {
        let result = score("Backend Engineer", "We write Rust services", &rules());
        assert_eq!(result.score, 15);
        assert_eq!(result.tags, vec!["backend", "rust"]);
    }

    #[test]
    fn each_rule_fires_once_despite_multiple_term_hits() {
        // Both "backend" and "back end" appear; the title rule still adds 10
        // exactly once.
        let result = score("Backend / Back End Engineer", "", &rules());
        assert_eq!(result.score, 10);
        assert_eq!(result.tags, vec!["backend"]);
    }

    #[test]
    fn duplicate_tags_collapse_in_first_match_order() {
        let result = score("Backend Engineer", "You will own our API in Rust", &rules());
        // title "backend" (10) + keyword "rust" (5) + keyword "api" (3),
        // but the second "backend" tag is not repeated.
        assert_eq!(result.score, 18);
        assert_eq!(result.tags, vec!["backend", "rust"]);
    }

    #[test]
    fn penalties_subtract_and_never_tag() {
        let result = score("Backend Engineer", "posted by a staffing agency", &rules());
        assert_eq!(result.score, 2);
        assert_eq!(result.tags, vec!["backend"]);
    }

    #[test]
    fn matching_ignores_case() {
        let result = score("BACKEND ENGINEER", "RUST ONLY", &rules());
        assert_eq!(result.score, 15);
    }

    #[test]
    fn no_rules_scores_zero() {
        let result = score("Anything", "at all", &ScoringConfig::default());
        assert_eq!(result, ScoreResult::default());
    }
}
