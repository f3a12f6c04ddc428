//! File content storage port

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::StorageError;

/// File content as a sequence of chunks
pub type ContentStream = BoxStream<'static, std::io::Result<Vec<u8>>>;

/// Stores file bytes under relative keys such as `2024/05/<uuid>.pdf`
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Stream stored content without buffering it whole
    async fn open(&self, key: &str) -> Result<ContentStream, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}
