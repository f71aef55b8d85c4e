//! services/api/src/adapters/storage.rs
//!
//! Local-disk implementation of the `FileStorage` port. Files land in the
//! configured upload directory and are served back under `/uploads`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use study_planner_core::ports::{FileStorage, PortError, PortResult, StoredFile};
use tracing::{info, warn};
use uuid::Uuid;

/// Route prefix the upload directory is mounted on.
pub const UPLOADS_ROUTE: &str = "/uploads";

const MAX_EXTENSION_CHARS: usize = 10;

#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    root: PathBuf,
    public_base: String,
}

impl LocalFileStorage {
    /// `public_base` is the server's own URL, without a trailing slash.
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a public id to a path inside the root, refusing anything that
    /// could escape it.
    fn path_for(&self, public_id: &str) -> PortResult<PathBuf> {
        let valid = !public_id.is_empty()
            && public_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
            && !public_id.starts_with('.');
        if !valid {
            return Err(PortError::NotFound(format!("Stored file {} not found", public_id)));
        }
        Ok(self.root.join(public_id))
    }
}

/// Keeps a short alphanumeric extension from the original file name.
fn extension_of(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    let usable = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_CHARS
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    usable.then_some(ext)
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, file_name: &str, data: &[u8]) -> PortResult<StoredFile> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let public_id = match extension_of(file_name) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let path = self.path_for(&public_id)?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        info!(public_id = %public_id, bytes = data.len(), "Stored uploaded file");
        Ok(StoredFile {
            url: format!("{}{}/{}", self.public_base, UPLOADS_ROUTE, public_id),
            public_id,
        })
    }

    async fn remove(&self, public_id: &str) -> PortResult<()> {
        let path = self.path_for(public_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Already gone; the record can still be deleted.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(public_id = %public_id, "Stored file was already missing");
                Ok(())
            }
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("study-planner-uploads-{}", Uuid::new_v4()))
    }

    #[test]
    fn extension_is_kept_only_when_safe() {
        assert_eq!(extension_of("Lecture 1.PDF").as_deref(), Some("pdf"));
        assert_eq!(extension_of("notes"), None);
        assert_eq!(extension_of("evil.p/h"), None);
        assert_eq!(extension_of("archive."), None);
    }

    #[tokio::test]
    async fn store_then_remove_round_trip() {
        let root = temp_root();
        let storage = LocalFileStorage::new(&root, "http://localhost:5000");

        let stored = storage.store("chapter.pdf", b"%PDF-1.4").await.unwrap();
        assert!(stored.public_id.ends_with(".pdf"));
        assert_eq!(
            stored.url,
            format!("http://localhost:5000/uploads/{}", stored.public_id)
        );
        let on_disk = tokio::fs::read(root.join(&stored.public_id)).await.unwrap();
        assert_eq!(on_disk, b"%PDF-1.4");

        storage.remove(&stored.public_id).await.unwrap();
        assert!(!root.join(&stored.public_id).exists());
        // Removing twice is tolerated.
        storage.remove(&stored.public_id).await.unwrap();

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn remove_rejects_path_traversal() {
        let storage = LocalFileStorage::new(temp_root(), "http://localhost:5000");
        let err = storage.remove("../secrets").await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }
}
