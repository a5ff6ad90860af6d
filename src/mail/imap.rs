//! IMAP-backed mailbox access.
//!
//! One session per fetch cycle: connect over TLS, select the mailbox,
//! search and fetch, store flags, log out on drop. All calls are blocking
//! and run inside `spawn_blocking` from the async side.

use std::collections::HashMap;
use std::net::TcpStream;

use native_tls::{TlsConnector, TlsStream};
use tracing::warn;

use super::{MailConnector, MailMessage, MailSession, parse_message};
use crate::config::EmailSource;
use crate::error::MailError;

/// Opens live IMAP sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImapConnector;

impl MailConnector for ImapConnector {
    fn open(&self, cfg: &EmailSource, password: &str) -> Result<Box<dyn MailSession>, MailError> {
        let tls = TlsConnector::builder()
            .build()
            .map_err(|e| MailError::Connect(e.to_string()))?;

        let client = imap::connect((cfg.host.as_str(), cfg.port), cfg.host.as_str(), &tls)
            .map_err(|e| MailError::Connect(e.to_string()))?;

        let mut session = client
            .login(&cfg.username, password)
            .map_err(|(e, _client)| MailError::Auth(e.to_string()))?;

        session
            .select(&cfg.mailbox)
            .map_err(|e| MailError::Protocol(e.to_string()))?;

        Ok(Box::new(ImapMailSession { session }))
    }
}

struct ImapMailSession {
    session: imap::Session<TlsStream<TcpStream>>,
}

impl MailSession for ImapMailSession {
    fn fetch_unseen_since(
        &mut self,
        since_date: &str,
        limit: usize,
    ) -> Result<Vec<MailMessage>, MailError> {
        let query = format!("UNSEEN SINCE {}", since_date);
        let found = self
            .session
            .uid_search(&query)
            .map_err(|e| MailError::Protocol(e.to_string()))?;

        // Higher UID means more recently delivered.
        let mut uids: Vec<u32> = found.into_iter().collect();
        uids.sort_unstable_by(|a, b| b.cmp(a));
        uids.truncate(limit);

        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let fetches = self
            .session
            .uid_fetch(uid_set(&uids), "BODY.PEEK[]")
            .map_err(|e| MailError::Protocol(e.to_string()))?;

        // The server replies in its own order; index by UID so the result
        // keeps the newest-first ordering of the search.
        let mut by_uid: HashMap<u32, MailMessage> = HashMap::new();
        for fetch in fetches.iter() {
            let Some(uid) = fetch.uid else { continue };
            let Some(raw) = fetch.body() else { continue };
            match parse_message(uid, raw) {
                Some(message) => {
                    by_uid.insert(uid, message);
                }
                None => warn!(uid, "Skipping message that failed to parse"),
            }
        }

        Ok(uids.into_iter().filter_map(|u| by_uid.remove(&u)).collect())
    }

    fn mark_seen(&mut self, uids: &[u32]) -> Result<(), MailError> {
        if uids.is_empty() {
            return Ok(());
        }

        self.session
            .uid_store(uid_set(uids), "+FLAGS (\\Seen)")
            .map_err(|e| MailError::Protocol(e.to_string()))?;

        Ok(())
    }
}

impl Drop for ImapMailSession {
    fn drop(&mut self) {
        let _ = self.session.logout();
    }
}

fn uid_set(uids: &[u32]) -> String {
    uids.iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
