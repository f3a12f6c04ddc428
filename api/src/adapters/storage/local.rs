//! Filesystem-backed FileStorage rooted at the configured upload directory

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use tokio::io::AsyncReadExt;

use crate::domain::ports::{ContentStream, FileStorage};
use crate::error::StorageError;

/// Read size for streamed downloads
const CHUNK_SIZE: usize = 64 * 1024;

/// Stores file bytes below a root directory
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root directory if it does not exist yet
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(StorageError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid storage key: {}", key),
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(key = %key, size = bytes.len(), "Stored file content");
        Ok(())
    }

    async fn open(&self, key: &str) -> Result<ContentStream, StorageError> {
        let path = self.resolve(key)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let chunks = stream::try_unfold(file, |mut file| async move {
            let mut chunk = vec![0; CHUNK_SIZE];
            let read = file.read(&mut chunk).await?;
            if read == 0 {
                return Ok(None);
            }
            chunk.truncate(read);
            Ok::<_, std::io::Error>(Some((chunk, file)))
        });
        Ok(chunks.boxed())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    fn temp_storage() -> LocalFileStorage {
        let dir = std::env::temp_dir().join(format!("projecxiq-storage-{}", uuid::Uuid::new_v4()));
        LocalFileStorage::new(dir)
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let storage = temp_storage();
        storage.ensure_root().await.unwrap();

        storage.save("2024/05/a.txt", b"hello").await.unwrap();
        let content: Vec<u8> = storage
            .open("2024/05/a.txt")
            .await
            .unwrap()
            .try_concat()
            .await
            .unwrap();
        assert_eq!(content, b"hello");

        storage.delete("2024/05/a.txt").await.unwrap();
        assert!(matches!(
            storage.open("2024/05/a.txt").await,
            Err(StorageError::NotFound(_))
        ));

        // deleting twice is fine
        storage.delete("2024/05/a.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let storage = temp_storage();
        assert!(storage.save("../escape.txt", b"x").await.is_err());
        assert!(storage.open("/etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn test_large_content_streams_in_chunks() {
        let storage = temp_storage();
        let bytes: Vec<u8> = (0..CHUNK_SIZE * 2 + 10).map(|i| (i % 251) as u8).collect();
        storage.save("big.bin", &bytes).await.unwrap();

        let chunks: Vec<Vec<u8>> = storage.open("big.bin").await.unwrap().try_collect().await.unwrap();
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.len() <= CHUNK_SIZE));
        assert_eq!(chunks.concat(), bytes);

        storage.delete("big.bin").await.unwrap();
    }
}
