//! Bearer token acquisition for the managed collaborators.
//!
//! Production deployments run with a system-assigned managed identity: a
//! token for each resource (vault, Synapse) is fetched from the instance
//! metadata endpoint. Tests and local development use a static bearer token
//! and may point the metadata URL at a local server.

use reqwest::Client;

use crate::error::{Error, Result};
use crate::secrets::SecretValue;

/// Resource identifier for Key Vault tokens.
pub const VAULT_RESOURCE: &str = "https://vault.azure.net";

/// Resource identifier for Synapse dev-endpoint tokens.
pub const SYNAPSE_RESOURCE: &str = "https://dev.azuresynapse.net";

const DEFAULT_METADATA_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const METADATA_API_VERSION: &str = "2018-02-01";

/// Source of bearer tokens for outbound calls.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// A fixed bearer token, supplied out of band (tests, local dev).
    StaticBearer(SecretValue),
    /// Managed identity token fetched from the instance metadata endpoint.
    ManagedIdentity {
        /// Resource the token is requested for (e.g. [`VAULT_RESOURCE`]).
        resource: String,
        /// Metadata endpoint override (tests only).
        metadata_url: Option<String>,
    },
}

impl TokenSource {
    /// Managed identity source for the given resource.
    #[must_use]
    pub fn managed_identity(resource: impl Into<String>) -> Self {
        Self::ManagedIdentity {
            resource: resource.into(),
            metadata_url: None,
        }
    }

    /// Test helper to override the metadata URL.
    #[must_use]
    pub fn with_metadata_url(self, metadata_url: impl Into<String>) -> Self {
        match self {
            Self::ManagedIdentity { resource, .. } => Self::ManagedIdentity {
                resource,
                metadata_url: Some(metadata_url.into()),
            },
            other => other,
        }
    }

    /// Returns a bearer token for the configured source.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unavailable` if the metadata endpoint cannot be
    /// reached or returns an unusable response.
    pub async fn token(&self, client: &Client) -> Result<SecretValue> {
        match self {
            Self::StaticBearer(token) => Ok(token.clone()),
            Self::ManagedIdentity {
                resource,
                metadata_url,
            } => {
                let url = metadata_url.as_deref().unwrap_or(DEFAULT_METADATA_URL);
                let response = client
                    .get(url)
                    .header("Metadata", "true")
                    .query(&[
                        ("api-version", METADATA_API_VERSION),
                        ("resource", resource.as_str()),
                    ])
                    .send()
                    .await
                    .map_err(|e| {
                        Error::unavailable("identity", format!("metadata request failed: {e}"))
                    })?;

                if !response.status().is_success() {
                    return Err(Error::unavailable(
                        "identity",
                        format!("metadata endpoint returned {}", response.status()),
                    ));
                }

                let body: serde_json::Value = response.json().await.map_err(|e| {
                    Error::unavailable("identity", format!("invalid metadata response: {e}"))
                })?;
                body.get("access_token")
                    .and_then(|v| v.as_str())
                    .filter(|t| !t.is_empty())
                    .map(SecretValue::new)
                    .ok_or_else(|| {
                        Error::unavailable("identity", "metadata response missing access_token")
                    })
            }
        }
    }
}
