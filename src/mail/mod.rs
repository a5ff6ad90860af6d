//! Mail access module
//!
//! Abstracts the mailbox the email fetcher reads job alerts from. The
//! fetcher only sees [`MailMessage`] values and the two session operations
//! it needs, so tests can substitute a canned mailbox for a live IMAP
//! server.

pub mod imap;

use mail_parser::MessageParser;

use crate::config::EmailSource;
use crate::error::MailError;

pub use imap::ImapConnector;

/// A single message pulled from the mailbox, decoded far enough for
/// alert parsing.
#[derive(Debug, Clone, Default)]
pub struct MailMessage {
    /// Server-assigned UID within the selected mailbox
    pub uid: u32,
    /// RFC 5322 Message-ID header, when present
    pub message_id: Option<String>,
    /// Sender address (bare address, no display name)
    pub from: String,
    /// Subject line, decoded
    pub subject: String,
    /// First HTML body part, empty when the message has none
    pub body_html: String,
    /// First plain-text body part, empty when the message has none
    pub body_text: String,
}

/// An open, authenticated mailbox session.
///
/// Implementations are blocking; callers run them on a blocking-capable
/// task.
pub trait MailSession: Send {
    /// Fetch up to `limit` unseen messages received since `since_date`
    /// (an IMAP `dd-Mon-yyyy` date), newest first.
    fn fetch_unseen_since(
        &mut self,
        since_date: &str,
        limit: usize,
    ) -> Result<Vec<MailMessage>, MailError>;

    /// Flag the given UIDs as seen so the next run does not re-read them.
    fn mark_seen(&mut self, uids: &[u32]) -> Result<(), MailError>;
}

/// Opens mailbox sessions. The credential is passed in at open time and
/// never stored.
pub trait MailConnector: Send + Sync {
    fn open(&self, cfg: &EmailSource, password: &str) -> Result<Box<dyn MailSession>, MailError>;
}

/// Format a timestamp as an IMAP search date (`23-May-2026`).
pub fn imap_date(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format("%d-%b-%Y").to_string()
}

/// Case-insensitive "subject contains any of the terms" check. An empty
/// term list matches every subject.
pub fn subject_matches(subject: &str, any: &[String]) -> bool {
    if any.iter().all(|term| term.trim().is_empty()) {
        return true;
    }
    let subject_lower = subject.to_lowercase();
    any.iter()
        .map(|term| term.trim().to_lowercase())
        .filter(|term| !term.is_empty())
        .any(|term| subject_lower.contains(&term))
}

/// Decode a raw RFC 5322 message into the fields alert parsing needs.
/// Returns `None` when the bytes are not parseable as a message.
pub fn parse_message(uid: u32, raw: &[u8]) -> Option<MailMessage> {
    let parsed = MessageParser::default().parse(raw)?;

    let from = parsed
        .from()
        .and_then(|a| a.first())
        .and_then(|addr| addr.address())
        .unwrap_or("")
        .to_string();

    Some(MailMessage {
        uid,
        message_id: parsed.message_id().map(|id| id.to_string()),
        from,
        subject: parsed.subject().unwrap_or("").to_string(),
        body_html: parsed
            .body_html(0)
            .map(|b| b.into_owned())
            .unwrap_or_default(),
        body_text: parsed
            .body_text(0)
            .map(|b| b.into_owned())
            .unwrap_or_default(),
    })
}
