//! Credential resolution.
//!
//! Configuration structures never carry secrets; anything sensitive is
//! pulled through a [`SecretStore`] at the moment of use. The default store
//! reads process environment variables, which keeps local runs simple while
//! letting deployments swap in whatever vault they have.

use std::collections::HashMap;

use thiserror::Error;

/// Name of the IMAP password secret.
pub const EMAIL_PASSWORD: &str = "email_password";

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret '{name}' is not available")]
    NotFound { name: String },
}

/// Source of credentials.
pub trait SecretStore: Send + Sync {
    fn get(&self, name: &str) -> Result<String, SecretError>;
}

/// Resolves a secret named `email_password` from
/// `JOBSCOUT_SECRET_EMAIL_PASSWORD`.
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get(&self, name: &str) -> Result<String, SecretError> {
        let var = format!("JOBSCOUT_SECRET_{}", name.to_uppercase());
        std::env::var(&var)
            .ok()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| SecretError::NotFound {
                name: name.to_string(),
            })
    }
}

/// Fixed in-memory store for tests and embedded setups.
#[derive(Default)]
pub struct MemorySecretStore {
    entries: HashMap<String, String>,
}

impl MemorySecretStore {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, name: &str) -> Result<String, SecretError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::NotFound {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_store_reads_prefixed_variable() {
        unsafe {
            std::env::set_var("JOBSCOUT_SECRET_EMAIL_PASSWORD", "hunter2");
        }
        let store = EnvSecretStore;
        assert_eq!(store.get(EMAIL_PASSWORD).unwrap(), "hunter2");
        unsafe {
            std::env::remove_var("JOBSCOUT_SECRET_EMAIL_PASSWORD");
        }
    }

    #[test]
    fn env_store_treats_empty_as_missing() {
        unsafe {
            std::env::set_var("JOBSCOUT_SECRET_TEST_EMPTY", "");
        }
        let store = EnvSecretStore;
        assert!(store.get("test_empty").is_err());
        unsafe {
            std::env::remove_var("JOBSCOUT_SECRET_TEST_EMPTY");
        }
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemorySecretStore::new([(EMAIL_PASSWORD.to_string(), "pw".to_string())]);
        assert_eq!(store.get(EMAIL_PASSWORD).unwrap(), "pw");
        assert!(store.get("other").is_err());
    }
}
