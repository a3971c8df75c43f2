//! Per-request secret resolution.
//!
//! Exactly one fetch per name, no caching beyond the returned map (which
//! lives only for the request), no retries. Failures map onto the two
//! secret kinds of the taxonomy; everything that is not a definitive
//! "absent" from the store is treated as the store being unavailable.

use std::collections::BTreeMap;

use lakegate_core::{Error, SecretStore, SecretValue};

use crate::error::IngestError;

/// Resolves each named secret, in order, stopping at the first failure.
///
/// # Errors
///
/// - [`IngestError::SecretNotFound`] when the store reports a name absent
/// - [`IngestError::SecretStoreUnavailable`] on transport/auth failure
pub async fn resolve(
    store: &dyn SecretStore,
    names: &[&str],
) -> Result<BTreeMap<String, SecretValue>, IngestError> {
    let mut resolved = BTreeMap::new();
    for name in names {
        let value = store.get_secret(name).await.map_err(|e| match e {
            Error::SecretNotFound { name } => IngestError::SecretNotFound { name },
            other => IngestError::SecretStoreUnavailable {
                message: other.to_string(),
            },
        })?;
        resolved.insert((*name).to_string(), value);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakegate_core::MemorySecretStore;

    #[tokio::test]
    async fn resolves_all_names() {
        let store = MemorySecretStore::new()
            .with_secret("model-id", "m-1")
            .with_secret("api-key", "k-1");

        let resolved = resolve(&store, &["model-id", "api-key"]).await.unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved["model-id"].expose(), "m-1");
        assert_eq!(resolved["api-key"].expose(), "k-1");
    }

    #[tokio::test]
    async fn missing_name_maps_to_secret_not_found() {
        let store = MemorySecretStore::new().with_secret("model-id", "m-1");

        let err = resolve(&store, &["model-id", "api-key"]).await.unwrap_err();
        assert!(matches!(err, IngestError::SecretNotFound { name } if name == "api-key"));
    }

    #[tokio::test]
    async fn error_messages_never_contain_values() {
        let store = MemorySecretStore::new();
        let err = resolve(&store, &["model-id"]).await.unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("model-id"));
        assert!(!rendered.contains("m-1"));
    }
}
