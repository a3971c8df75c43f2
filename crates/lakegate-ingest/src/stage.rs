//! Remote staging of validated archive members.
//!
//! Members are uploaded one at a time to
//! `{directory}/{member.relative_path}` with overwrite semantics. The first
//! failing member aborts the run: members staged before it remain in the
//! store (there is no transactional guarantee across the remote store, and
//! no rollback), members after it are never attempted, and the error names
//! the member that failed.

use tracing::debug;

use lakegate_core::ObjectStore;

use crate::archive::ArchiveMember;
use crate::error::IngestError;

/// Destination within the store's bound file system.
#[derive(Debug, Clone)]
pub struct StagingTarget {
    /// Directory prefix under which members are written.
    pub directory: String,
}

impl StagingTarget {
    /// Creates a target for the given directory.
    #[must_use]
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Object key for a member, preserving its relative path.
    #[must_use]
    pub fn object_path(&self, member: &ArchiveMember) -> String {
        let directory = self.directory.trim_matches('/');
        if directory.is_empty() {
            member.relative_path.clone()
        } else {
            format!("{directory}/{}", member.relative_path)
        }
    }
}

/// Uploads all members to the target, aborting on the first failure.
///
/// Returns the number of members uploaded.
///
/// # Errors
///
/// Returns [`IngestError::UploadFailed`] naming the first member that could
/// not be written.
pub async fn stage(
    store: &dyn ObjectStore,
    target: &StagingTarget,
    members: &[ArchiveMember],
) -> Result<usize, IngestError> {
    let mut staged = 0usize;
    for member in members {
        let path = target.object_path(member);
        store
            .put(&path, member.bytes.clone())
            .await
            .map_err(|e| IngestError::UploadFailed {
                member: member.relative_path.clone(),
                message: e.to_string(),
            })?;
        staged += 1;
        debug!(path = %path, size = member.len(), "staged archive member");
    }
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use lakegate_core::{Error, MemoryStore, ObjectMeta};

    fn member(path: &str, content: &[u8]) -> ArchiveMember {
        ArchiveMember {
            relative_path: path.to_string(),
            bytes: Bytes::copy_from_slice(content),
        }
    }

    /// Store wrapper that fails `put` for one configured path.
    struct FailOnPathStore {
        inner: MemoryStore,
        fail_path: String,
    }

    #[async_trait]
    impl ObjectStore for FailOnPathStore {
        async fn put(&self, path: &str, data: Bytes) -> lakegate_core::Result<()> {
            if path == self.fail_path {
                return Err(Error::storage(format!("simulated quota error on {path}")));
            }
            self.inner.put(path, data).await
        }

        async fn get(&self, path: &str) -> lakegate_core::Result<Bytes> {
            self.inner.get(path).await
        }

        async fn list(&self, prefix: &str) -> lakegate_core::Result<Vec<ObjectMeta>> {
            self.inner.list(prefix).await
        }

        async fn head(&self, path: &str) -> lakegate_core::Result<Option<ObjectMeta>> {
            self.inner.head(path).await
        }
    }

    #[tokio::test]
    async fn stages_every_member_with_exact_content() {
        let store = MemoryStore::new();
        let target = StagingTarget::new("staging/input");
        let members = vec![
            member("train.csv", b"a,b\n"),
            member("meta/schema.json", b"{}"),
        ];

        let staged = stage(&store, &target, &members).await.unwrap();
        assert_eq!(staged, 2);

        assert_eq!(
            store.get("staging/input/train.csv").await.unwrap(),
            Bytes::from_static(b"a,b\n")
        );
        assert_eq!(
            store.get("staging/input/meta/schema.json").await.unwrap(),
            Bytes::from_static(b"{}")
        );
        assert_eq!(store.list("staging/input/").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn restaging_same_archive_is_idempotent() {
        let store = MemoryStore::new();
        let target = StagingTarget::new("staging");
        let members = vec![member("a.csv", b"1"), member("b.csv", b"2")];

        stage(&store, &target, &members).await.unwrap();
        stage(&store, &target, &members).await.unwrap();

        // Same final set of objects, no duplicates or renames.
        let listed = store.list("staging/").await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn aborts_on_first_failing_member() {
        let store = FailOnPathStore {
            inner: MemoryStore::new(),
            fail_path: "staging/b.csv".to_string(),
        };
        let target = StagingTarget::new("staging");
        let members = vec![
            member("a.csv", b"1"),
            member("b.csv", b"2"),
            member("c.csv", b"3"),
        ];

        let err = stage(&store, &target, &members).await.unwrap_err();
        match err {
            IngestError::UploadFailed { member, .. } => assert_eq!(member, "b.csv"),
            other => panic!("unexpected error: {other:?}"),
        }

        // Members before the failure remain; members after were never tried.
        assert!(store.inner.head("staging/a.csv").await.unwrap().is_some());
        assert!(store.inner.head("staging/c.csv").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_directory_uses_bare_member_paths() {
        let store = MemoryStore::new();
        let target = StagingTarget::new("");
        let members = vec![member("a.csv", b"1")];

        stage(&store, &target, &members).await.unwrap();
        assert!(store.head("a.csv").await.unwrap().is_some());
    }
}
