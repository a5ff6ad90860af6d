//! Email job-alert fetcher.
//!
//! Reads unseen alert messages out of an IMAP mailbox, pulls job links out
//! of the ones whose subject matches the configured terms, and flags the
//! handled messages seen so the next cycle starts where this one stopped.
//! The mailbox work is blocking and runs on the blocking pool; the
//! credential comes from the secret store at fetch time.

use std::sync::Arc;

use chrono::{Duration, Months, Utc};
use tracing::{debug, info};

use super::linkedin_alert::parse_alert_html;
use super::trait_::{FetchBatch, FetchContext, Fetcher, Lead};
use crate::config::EmailSource;
use crate::error::{FetchError, MailError};
use crate::identity::email_source_id;
use crate::mail::{MailConnector, imap_date, subject_matches};
use crate::normalize::canonical_url;
use crate::secrets::EMAIL_PASSWORD;

pub const EMAIL_SOURCE: &str = "email";

/// Newest unseen messages examined per run.
const MAX_MESSAGES: usize = 30;
/// Distinct job links taken from a single message.
const MAX_LINKS_PER_MESSAGE: usize = 20;
/// Leads produced per run across all messages.
const MAX_LEADS_PER_RUN: usize = 30;
/// How far back the unseen search reaches.
const LOOKBACK_MONTHS: u32 = 3;

/// Fetcher for job alerts delivered to a mailbox.
pub struct EmailFetcher {
    cfg: EmailSource,
    connector: Arc<dyn MailConnector>,
}

impl EmailFetcher {
    pub fn new(cfg: &EmailSource, connector: Arc<dyn MailConnector>) -> Self {
        Self {
            cfg: cfg.clone(),
            connector,
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for EmailFetcher {
    fn name(&self) -> &'static str {
        EMAIL_SOURCE
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchBatch, FetchError> {
        if self.cfg.host.trim().is_empty() || self.cfg.username.trim().is_empty() {
            return Err(FetchError::Config(
                "email source enabled without host/username".to_string(),
            ));
        }
        let password = ctx.secrets.get(EMAIL_PASSWORD).map_err(|_| {
            FetchError::Config(format!(
                "email password {:?} not available in secret store",
                EMAIL_PASSWORD
            ))
        })?;

        let now = Utc::now();
        let cutoff = now
            .checked_sub_months(Months::new(LOOKBACK_MONTHS))
            .unwrap_or(now - Duration::days(90));
        let since = imap_date(cutoff);

        let cfg = self.cfg.clone();
        let connector = self.connector.clone();

        let leads = tokio::task::spawn_blocking(move || read_mailbox(&cfg, &connector, &password, &since))
            .await
            .map_err(|e| MailError::Protocol(format!("mailbox worker failed: {}", e)))??;

        info!(count = leads.len(), "Email alerts produced leads");
        Ok(FetchBatch {
            source: EMAIL_SOURCE.to_string(),
            leads,
        })
    }
}

/// One complete mailbox pass: open, search, parse, flag seen.
fn read_mailbox(
    cfg: &EmailSource,
    connector: &Arc<dyn MailConnector>,
    password: &str,
    since: &str,
) -> Result<Vec<Lead>, FetchError> {
    let mut session = connector.open(cfg, password)?;
    let messages = session.fetch_unseen_since(since, MAX_MESSAGES)?;

    let mut leads: Vec<Lead> = Vec::new();
    let mut handled: Vec<u32> = Vec::new();

    for message in &messages {
        // Examined means handled: non-matching messages are flagged seen
        // too, so the unseen window always moves forward.
        handled.push(message.uid);

        if !subject_matches(&message.subject, &cfg.search_subject_any) {
            debug!(uid = message.uid, subject = %message.subject, "Skipping message without matching subject");
            continue;
        }

        let body = if message.body_html.is_empty() {
            &message.body_text
        } else {
            &message.body_html
        };

        let mut jobs = parse_alert_html(body);
        jobs.truncate(MAX_LINKS_PER_MESSAGE);

        for job in jobs {
            if leads.len() >= MAX_LEADS_PER_RUN {
                break;
            }

            let canonical = canonical_url(&job.url);
            let source_id = email_source_id(
                message.message_id.as_deref(),
                &message.from,
                &message.subject,
                &canonical,
            );

            leads.push(Lead {
                company: job.company,
                title: job.title,
                url: job.url,
                location: job.location,
                work_mode: job.work_mode,
                vendor_id: Some(job.id),
                description: String::new(),
                posted_at: None,
                source: EMAIL_SOURCE.to_string(),
                source_id,
                logo_url: job.logo_url,
            });
        }

        if leads.len() >= MAX_LEADS_PER_RUN {
            break;
        }
    }

    session.mark_seen(&handled)?;
    Ok(leads)
}
