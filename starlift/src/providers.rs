//! External collaborator interfaces: credential vending and run variables.
//!
//! Both are consumed through narrow traits; their real implementations
//! (an STS-style vending service, a scheduler variable store) live outside
//! this crate.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Short-lived object-storage credentials, fetched once per staging load.
#[derive(Clone)]
pub struct StorageCredentials {
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
}

impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Failure to vend credentials.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct CredentialError {
    /// Provider failure detail.
    pub reason: String,
}

impl CredentialError {
    /// Creates a new credential error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Vends short-lived object-storage credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Fetches a fresh credential pair.
    async fn credentials(&self) -> Result<StorageCredentials, CredentialError>;
}

/// A provider holding a fixed credential pair resolved at startup.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    credentials: StorageCredentials,
}

impl StaticCredentials {
    /// Creates a provider from a fixed key pair.
    #[must_use]
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            credentials: StorageCredentials {
                access_key: access_key.into(),
                secret_key: secret_key.into(),
            },
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credentials(&self) -> Result<StorageCredentials, CredentialError> {
        Ok(self.credentials.clone())
    }
}

/// Run-scoped variables resolved at graph-build time (bucket names,
/// key prefixes).
pub trait VariableStore: Send + Sync {
    /// Looks up a variable by name.
    fn get(&self, name: &str) -> Option<String>;
}

/// Variable store backed by process environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvVariables {
    prefix: String,
}

impl EnvVariables {
    /// Reads variables directly by name.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads variables with a fixed prefix prepended to every lookup.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl VariableStore for EnvVariables {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(format!("{}{name}", self.prefix)).ok()
    }
}

/// Variable store backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVariables {
    values: HashMap<String, String>,
}

impl InMemoryVariables {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl VariableStore for InMemoryVariables {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}
