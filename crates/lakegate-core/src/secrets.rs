//! Secret store abstraction and the Key Vault client.
//!
//! Secret values live only for the duration of a request and must never be
//! written to logs. [`SecretValue`] enforces the second half of that at the
//! type level: its `Debug` and `Display` render `[REDACTED]`, so a value
//! can only leak through an explicit [`SecretValue::expose`] call.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::error::{Error, Result};
use crate::identity::TokenSource;

const KEY_VAULT_API_VERSION: &str = "7.4";
const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// A resolved secret value with redacting `Debug`/`Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    /// Wraps a raw secret string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the underlying secret. Callers must not log the result.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretValue([REDACTED])")
    }
}

impl std::fmt::Display for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Secret store contract.
///
/// One fetch per name per request; no caching happens behind this seam.
#[async_trait]
pub trait SecretStore: Send + Sync + 'static {
    /// Fetches the named secret.
    ///
    /// Returns `Error::SecretNotFound` if the store reports the name is
    /// absent, `Error::Unavailable` on transport or auth failure. Neither
    /// is retried here.
    async fn get_secret(&self, name: &str) -> Result<SecretValue>;
}

/// In-memory secret store for testing and debug mode.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Arc<RwLock<HashMap<String, SecretValue>>>,
}

impl MemorySecretStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a secret, returning `self` for chaining.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (test-only type).
    #[must_use]
    pub fn with_secret(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets
            .write()
            .expect("lock poisoned")
            .insert(name.into(), SecretValue::new(value));
        self
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get_secret(&self, name: &str) -> Result<SecretValue> {
        let secrets = self.secrets.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        secrets
            .get(name)
            .cloned()
            .ok_or_else(|| Error::secret_not_found(name))
    }
}

/// HTTP client for the Key Vault secrets surface.
#[derive(Debug, Clone)]
pub struct KeyVaultClient {
    vault_url: String,
    client: Client,
    token: TokenSource,
}

impl KeyVaultClient {
    /// Creates a client targeting the given vault URL.
    #[must_use]
    pub fn new(vault_url: impl Into<String>, token: TokenSource) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            vault_url: vault_url.into(),
            client,
            token,
        }
    }

    fn secret_url(&self, name: &str) -> String {
        format!("{}/secrets/{name}", self.vault_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SecretStore for KeyVaultClient {
    async fn get_secret(&self, name: &str) -> Result<SecretValue> {
        let token = self.token.token(&self.client).await?;

        let response = self
            .client
            .get(self.secret_url(name))
            .bearer_auth(token.expose())
            .query(&[("api-version", KEY_VAULT_API_VERSION)])
            .send()
            .await
            .map_err(|e| {
                Error::unavailable("key vault", format!("secret request failed: {e}"))
            })?;

        match response.status() {
            status if status.is_success() => {
                let body: serde_json::Value = response.json().await.map_err(|e| {
                    Error::unavailable("key vault", format!("invalid secret response: {e}"))
                })?;
                body.get("value")
                    .and_then(|v| v.as_str())
                    .map(SecretValue::new)
                    .ok_or_else(|| {
                        Error::unavailable("key vault", "secret response missing value field")
                    })
            }
            StatusCode::NOT_FOUND => Err(Error::secret_not_found(name)),
            status => Err(Error::unavailable(
                "key vault",
                format!("secret request for {name} returned {status}"),
            )),
        }
    }
}
