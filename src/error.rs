//! # Error Handling
//!
//! Domain error types for the fetch/process pipeline. Each concern gets its
//! own enum so call sites can match on what actually went wrong instead of
//! string-inspecting a catch-all.

use reqwest::StatusCode;
use thiserror::Error;

/// Longest upstream body excerpt attached to decode errors.
const BODY_PREVIEW_MAX: usize = 240;

/// Errors produced while fetching leads from one upstream source.
///
/// A fetcher returns `Err` only when the source as a whole could not run;
/// per-company failures inside a source are logged and folded into a partial
/// `Ok` batch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source is enabled but its configuration is incomplete.
    #[error("source misconfigured: {0}")]
    Config(String),

    /// The upstream answered with a non-success status.
    #[error("upstream returned {status}: {preview}")]
    Http { status: StatusCode, preview: String },

    /// The request never completed (connect failure, TLS, timeout inside
    /// the HTTP client).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The upstream answered but the payload did not parse.
    #[error("decode failure in {context}: {preview}")]
    Decode { context: String, preview: String },

    /// An anti-bot challenge was detected; the host is skipped for the rest
    /// of the run.
    #[error("host {host} is serving an anti-bot challenge")]
    HostBlocked { host: String },

    /// The per-source deadline elapsed.
    #[error("source timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The poll cycle was cancelled while this source was running.
    #[error("fetch cancelled")]
    Canceled,

    /// The fetch task itself died before producing a result.
    #[error("fetch task failed: {0}")]
    Task(String),

    /// Mailbox-level failure in the email source.
    #[error(transparent)]
    Mail(#[from] MailError),
}

impl FetchError {
    /// Build an `Http` error with the response body truncated to a loggable
    /// preview.
    pub fn http(status: StatusCode, body: &str) -> Self {
        FetchError::Http {
            status,
            preview: body_preview(body),
        }
    }

    /// Build a `Decode` error with a truncated payload excerpt.
    pub fn decode(context: impl Into<String>, body: &str) -> Self {
        FetchError::Decode {
            context: context.into(),
            preview: body_preview(body),
        }
    }

    /// Whether retrying the same request later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Http { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            FetchError::Transport(err) => !err.is_status(),
            FetchError::Timeout { .. } => true,
            FetchError::Config(_)
            | FetchError::Decode { .. }
            | FetchError::HostBlocked { .. }
            | FetchError::Canceled
            | FetchError::Task(_)
            | FetchError::Mail(_) => false,
        }
    }
}

/// Errors raised by the IMAP mail source.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail connect failed: {0}")]
    Connect(String),
    #[error("mail login rejected: {0}")]
    Auth(String),
    #[error("mail protocol error: {0}")]
    Protocol(String),
    #[error("mail message unparseable: {0}")]
    Parse(String),
}

/// Per-lead failures inside the processing step. These are logged and the
/// batch continues; they never abort a cycle.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// A lead arrived without a URL. Identity derives from the URL, so this
    /// is a hard error for the row rather than something to paper over.
    #[error("lead from {source_name} has no url (company={company:?}, title={title:?})")]
    MissingUrl {
        source_name: String,
        company: String,
        title: String,
    },

    #[error("persistence failure: {0}")]
    Database(#[from] RepositoryError),
}

/// Persistence-layer error. Duplicate-key inserts are handled before this
/// wrapper is ever built.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl RepositoryError {
    /// Wrap a SeaORM error; shaped for `.map_err(RepositoryError::database_error)`.
    pub fn database_error(err: sea_orm::DbErr) -> Self {
        Self::Database(err)
    }
}

/// Whether a database error is a unique-constraint violation.
///
/// SQLite reports 1555 (primary key) or 2067 (unique index); Postgres uses
/// 23505. Duplicate inserts are an expected outcome of idempotent writes,
/// not a failure.
pub fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    match db_error.code() {
        Some(code) => {
            let code = code.as_ref();
            code == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code)
        }
        None => false,
    }
}

/// Truncate an upstream body to a size that is safe to log.
pub fn body_preview(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= BODY_PREVIEW_MAX {
        return trimmed.to_string();
    }
    let mut cut = BODY_PREVIEW_MAX;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &trimmed[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_truncates_long_bodies() {
        let body = "x".repeat(1000);
        let err = FetchError::http(StatusCode::BAD_GATEWAY, &body);
        match err {
            FetchError::Http { status, preview } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(preview.len(), BODY_PREVIEW_MAX + 3);
                assert!(preview.ends_with("..."));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn body_preview_respects_char_boundaries() {
        let body = "é".repeat(200);
        let preview = body_preview(&body);
        assert!(preview.len() <= BODY_PREVIEW_MAX + 3);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn transient_classification() {
        assert!(
            FetchError::http(StatusCode::SERVICE_UNAVAILABLE, "down").is_transient()
        );
        assert!(FetchError::http(StatusCode::TOO_MANY_REQUESTS, "slow down").is_transient());
        assert!(!FetchError::http(StatusCode::NOT_FOUND, "gone").is_transient());
        assert!(!FetchError::Config("missing host".into()).is_transient());
        assert!(
            !FetchError::HostBlocked {
                host: "acme.wd1.myworkdayjobs.com".into()
            }
            .is_transient()
        );
        assert!(FetchError::Timeout { seconds: 300 }.is_transient());
    }

    #[test]
    fn short_bodies_pass_through_untruncated() {
        assert_eq!(body_preview("  hello  "), "hello");
    }
}
