//! Audio payload storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::error::QueueError;

/// Storage for task inputs, addressed by an opaque reference string.
#[async_trait]
pub trait PayloadStore: Send + Sync {
    /// Persist bytes and return the reference recorded on the task.
    async fn save(&self, data: &[u8], extension: &str) -> Result<String, QueueError>;

    /// Filesystem location the executor reads.
    fn resolve(&self, payload_ref: &str) -> PathBuf;

    /// Whether the payload is still present.
    async fn exists(&self, payload_ref: &str) -> bool;

    /// Delete a payload. A payload that is already gone is not an error.
    async fn remove(&self, payload_ref: &str) -> Result<bool, QueueError>;
}

/// Payloads stored as `<uuid>.<ext>` files under one directory.
pub struct FilePayloadStore {
    root: PathBuf,
}

impl FilePayloadStore {
    /// Create the store, creating `root` if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, QueueError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| QueueError::Payload(format!("{}: {}", root.display(), e)))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Keep short alphanumeric extensions; anything else becomes `wav`.
pub fn sanitize_extension(ext: &str) -> String {
    let ext = ext.trim().trim_start_matches('.');
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return "wav".to_string();
    }
    ext.to_ascii_lowercase()
}

#[async_trait]
impl PayloadStore for FilePayloadStore {
    async fn save(&self, data: &[u8], extension: &str) -> Result<String, QueueError> {
        let name = format!("{}.{}", Uuid::new_v4(), sanitize_extension(extension));
        let path = self.root.join(name);

        fs::write(&path, data)
            .await
            .map_err(|e| QueueError::Payload(format!("{}: {}", path.display(), e)))?;

        debug!("Saved payload {} ({} bytes)", path.display(), data.len());
        Ok(path.to_string_lossy().into_owned())
    }

    fn resolve(&self, payload_ref: &str) -> PathBuf {
        let path = PathBuf::from(payload_ref);
        if path.is_absolute() {
            path
        } else {
            self.root.join(path)
        }
    }

    async fn exists(&self, payload_ref: &str) -> bool {
        fs::metadata(self.resolve(payload_ref))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    async fn remove(&self, payload_ref: &str) -> Result<bool, QueueError> {
        let path = self.resolve(payload_ref);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(QueueError::Payload(format!("{}: {}", path.display(), e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_extension() {
        assert_eq!(sanitize_extension("MP3"), "mp3");
        assert_eq!(sanitize_extension(".flac"), "flac");
        assert_eq!(sanitize_extension(""), "wav");
        assert_eq!(sanitize_extension("../etc"), "wav");
        assert_eq!(sanitize_extension("verylongext"), "wav");
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let dir = TempDir::new().unwrap();
        let store = FilePayloadStore::new(dir.path().join("audio")).await.unwrap();

        let payload_ref = store.save(b"RIFF", "wav").await.unwrap();
        assert!(payload_ref.ends_with(".wav"));
        assert!(store.exists(&payload_ref).await);

        let content = fs::read(store.resolve(&payload_ref)).await.unwrap();
        assert_eq!(content, b"RIFF");

        assert!(store.remove(&payload_ref).await.unwrap());
        assert!(!store.exists(&payload_ref).await);
        assert!(!store.remove(&payload_ref).await.unwrap());
    }

    #[tokio::test]
    async fn test_unique_names() {
        let dir = TempDir::new().unwrap();
        let store = FilePayloadStore::new(dir.path()).await.unwrap();

        let a = store.save(b"a", "wav").await.unwrap();
        let b = store.save(b"a", "wav").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_resolve_relative() {
        let dir = TempDir::new().unwrap();
        let store = FilePayloadStore::new(dir.path()).await.unwrap();
        assert_eq!(store.resolve("x.wav"), dir.path().join("x.wav"));
    }
}
