//! Hierarchical object store abstraction.
//!
//! The staging destination is a filesystem-like namespace over an object
//! storage backend (Azure Data Lake in production). A store handle is bound
//! to one file system (container) at construction; paths passed to the
//! trait are `directory/relative/member` keys within that file system.
//!
//! Writes are plain overwrites: re-staging the same relative path replaces
//! the prior object, which is what makes archive re-submission idempotent.
//! There is no versioning and no conditional-write machinery here.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::path::Path as StorePath;
use object_store::ObjectStore as _;

use crate::error::{Error, Result};
use crate::secrets::SecretValue;

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Object path (key) within the file system.
    pub path: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Hierarchical object store contract.
///
/// Implementations must be safe for concurrent use by multiple simultaneous
/// requests; handles are constructed once at startup and never mutated.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Writes an object, overwriting any existing object at that path.
    async fn put(&self, path: &str, data: Bytes) -> Result<()>;

    /// Reads an entire object.
    ///
    /// Returns `Error::NotFound` if the object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Lists objects with the given prefix, in arbitrary order.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Gets object metadata without reading content.
    ///
    /// Returns `None` if the object doesn't exist.
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>>;
}

/// In-memory object store for testing and debug mode.
///
/// Thread-safe via `RwLock`. Not suitable for production.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

impl MemoryStore {
    /// Creates a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        objects.insert(
            path.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(path, obj)| ObjectMeta {
                path: path.clone(),
                size: obj.data.len() as u64,
                last_modified: Some(obj.last_modified),
            })
            .collect())
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        Ok(objects.get(path).map(|obj| ObjectMeta {
            path: path.to_string(),
            size: obj.data.len() as u64,
            last_modified: Some(obj.last_modified),
        }))
    }
}

/// Azure Data Lake store backed by the `object_store` crate.
///
/// Bound to one storage account + file system (container). The account key
/// is resolved from the secret store at startup when configured; otherwise
/// the builder falls back to ambient `AZURE_*` environment credentials.
pub struct AdlsStore {
    inner: Arc<dyn object_store::ObjectStore>,
}

impl std::fmt::Debug for AdlsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdlsStore")
            .field("inner", &"<object_store>")
            .finish()
    }
}

impl AdlsStore {
    /// Creates a store bound to `account`/`file_system`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be constructed from the given
    /// account settings.
    pub fn new(
        account: &str,
        file_system: &str,
        access_key: Option<&SecretValue>,
    ) -> Result<Self> {
        let mut builder = MicrosoftAzureBuilder::from_env()
            .with_account(account)
            .with_container_name(file_system);
        if let Some(key) = access_key {
            builder = builder.with_access_key(key.expose());
        }
        let inner = builder.build().map_err(|e| {
            Error::storage_with_source(format!("failed to build ADLS backend for {account}"), e)
        })?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Creates a store from an Azure storage connection string secret.
    ///
    /// The account name and key are parsed out of the secret value; error
    /// messages never echo the value itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is missing `AccountName` or
    /// `AccountKey`, or if the backend cannot be constructed.
    pub fn from_connection_string(
        connection_string: &SecretValue,
        file_system: &str,
    ) -> Result<Self> {
        let (account, key) = parse_connection_string(connection_string.expose())?;
        let key = SecretValue::new(key);
        Self::new(&account, file_system, Some(&key))
    }
}

/// Extracts `(AccountName, AccountKey)` from a `key=value;...` connection
/// string. Keys are matched case-insensitively.
fn parse_connection_string(value: &str) -> Result<(String, String)> {
    let mut account = None;
    let mut key = None;
    for segment in value.split(';') {
        let Some((name, rest)) = segment.split_once('=') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "accountname" => account = Some(rest.trim().to_string()),
            "accountkey" => key = Some(rest.trim().to_string()),
            _ => {}
        }
    }
    match (account, key) {
        (Some(account), Some(key)) => Ok((account, key)),
        (None, _) => Err(Error::InvalidInput(
            "connection string is missing AccountName".to_string(),
        )),
        (_, None) => Err(Error::InvalidInput(
            "connection string is missing AccountKey".to_string(),
        )),
    }
}

#[async_trait]
impl ObjectStore for AdlsStore {
    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let location = StorePath::from(path);
        self.inner
            .put(&location, data.into())
            .await
            .map_err(|e| Error::storage_with_source(format!("put failed for {path}"), e))?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let location = StorePath::from(path);
        let result = self.inner.get(&location).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => {
                Error::NotFound(format!("object not found: {path}"))
            }
            other => Error::storage_with_source(format!("get failed for {path}"), other),
        })?;
        result
            .bytes()
            .await
            .map_err(|e| Error::storage_with_source(format!("read failed for {path}"), e))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let location = StorePath::from(prefix);
        let entries: Vec<object_store::ObjectMeta> = self
            .inner
            .list(Some(&location))
            .try_collect()
            .await
            .map_err(|e| Error::storage_with_source(format!("list failed for {prefix}"), e))?;
        Ok(entries
            .into_iter()
            .map(|meta| ObjectMeta {
                path: meta.location.to_string(),
                size: meta.size,
                last_modified: Some(meta.last_modified),
            })
            .collect())
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let location = StorePath::from(path);
        match self.inner.head(&location).await {
            Ok(meta) => Ok(Some(ObjectMeta {
                path: meta.location.to_string(),
                size: meta.size,
                last_modified: Some(meta.last_modified),
            })),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(Error::storage_with_source(
                format!("head failed for {path}"),
                e,
            )),
        }
    }
}
