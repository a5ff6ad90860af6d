//! LinkedIn job-alert email parsing.
//!
//! Alert emails wrap each posting in several anchors pointing at the same
//! `/jobs/view/{id}` URL (logo image, title, footer button), surrounded by
//! text fragments like "Acme Corp · Denver, CO (Remote)" and salary blurbs.
//! Parsing collapses the anchors by job id and scavenges the company and
//! location out of the nearby text.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::normalize::clean_text;

static JOB_VIEW_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/jobs/view/(\d+)").unwrap());

static SALARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s*\d[\d,.]*\s*[KkMm]?(?:\s*[-\u{2013}]\s*\$?\s*\d[\d,.]*\s*[KkMm]?)?(?:\s*/\s*(?:yr|hr|year|hour|mo|month|wk|week))?")
        .unwrap()
});

static WORK_MODE_PAREN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\((remote|hybrid|on-?site)\)").unwrap());

/// Anchor texts that are call-to-action chrome rather than job titles.
const GENERIC_LINK_TEXTS: &[&str] = &["view job", "see job", "apply", "apply now", "easy apply"];

/// One job extracted from an alert email, keyed by the LinkedIn job id.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct AlertJob {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub work_mode: String,
    pub url: String,
    pub logo_url: Option<String>,
}

/// Extract the distinct jobs referenced by an alert email body, in
/// document order. Repeated links to the same job merge, with the first
/// non-empty value winning per field.
pub(crate) fn parse_alert_html(html: &str) -> Vec<AlertJob> {
    let Ok(anchor_sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let Ok(img_sel) = Selector::parse("img[src]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut jobs: Vec<AlertJob> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for anchor in document.select(&anchor_sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(id) = JOB_VIEW_RE
            .captures(href)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
        else {
            continue;
        };

        let slot = *index.entry(id.clone()).or_insert_with(|| {
            jobs.push(AlertJob {
                url: format!("https://www.linkedin.com/jobs/view/{}/", id),
                id,
                ..AlertJob::default()
            });
            jobs.len() - 1
        });
        let job = &mut jobs[slot];

        if job.title.is_empty() {
            let text = clean_text(&anchor.text().collect::<Vec<_>>().join(" "));
            let text = strip_salary(&text);
            if !text.is_empty() && !is_generic_link_text(&text) {
                job.title = text;
            }
        }

        if job.company.is_empty() || job.logo_url.is_none() {
            scavenge_context(anchor, &img_sel, job);
        }
    }

    jobs
}

/// Walk up from the anchor looking for the "Company · Location" fragment
/// and a logo image in the same card.
fn scavenge_context(anchor: ElementRef<'_>, img_sel: &Selector, job: &mut AlertJob) {
    let mut node = anchor.parent();
    for _ in 0..4 {
        let Some(parent) = node else { break };

        if let Some(container) = ElementRef::wrap(parent) {
            if job.company.is_empty() {
                if let Some((company, location, work_mode)) = find_company_line(container, &job.title)
                {
                    job.company = company;
                    job.location = location;
                    job.work_mode = work_mode;
                }
            }

            if job.logo_url.is_none() {
                job.logo_url = container
                    .select(img_sel)
                    .filter_map(|img| img.value().attr("src"))
                    .find(|src| src.starts_with("http"))
                    .map(|src| src.to_string());
            }

            if !job.company.is_empty() && job.logo_url.is_some() {
                return;
            }
        }

        node = parent.parent();
    }
}

fn find_company_line(
    container: ElementRef<'_>,
    title: &str,
) -> Option<(String, String, String)> {
    for piece in container.text() {
        let piece = clean_text(piece);
        if piece.is_empty() || !piece.contains('\u{b7}') || piece == title {
            continue;
        }
        // A piece that is nothing but a salary range is noise.
        if SALARY_RE.replace_all(&piece, "").trim().is_empty() {
            continue;
        }

        let mut segments = piece.split('\u{b7}').map(|s| s.trim());
        let company = strip_salary(segments.next().unwrap_or_default());
        if company.is_empty() {
            continue;
        }

        let raw_location = strip_salary(segments.next().unwrap_or_default());
        let work_mode = work_mode_hint(&raw_location);
        let location = clean_text(&WORK_MODE_PAREN_RE.replace_all(&raw_location, ""));

        return Some((company, location, work_mode));
    }
    None
}

fn strip_salary(text: &str) -> String {
    clean_text(SALARY_RE.replace_all(text, "").trim_matches(['-', ',', ' ']))
}

fn work_mode_hint(location: &str) -> String {
    let lower = location.to_lowercase();
    if lower.contains("remote") {
        "remote".to_string()
    } else if lower.contains("hybrid") {
        "hybrid".to_string()
    } else if lower.contains("on-site") || lower.contains("onsite") {
        "on-site".to_string()
    } else {
        String::new()
    }
}

fn is_generic_link_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    GENERIC_LINK_TEXTS.iter().any(|generic| lower == *generic)
}
