use std::io;
use std::time::SystemTime;

use bytes::Bytes;
use futures::stream::BoxStream;
use tonic::async_trait;

mod from_addr;
mod memory;
mod object_store;

#[cfg(test)]
pub mod tests;

pub use self::from_addr::from_addr;
pub use self::memory::MemoryBlobStore;
pub use self::object_store::ObjectStoreBlobStore;

/// Metadata about a blob, as returned by [BlobStore::list].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: SystemTime,
}

/// The trait backing a single storage tier.
/// It's a flat key/value store for byte blobs. Keys are handle ids, the
/// tier itself is not part of the key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Check if the store has a blob with the given key.
    async fn has(&self, key: &str) -> io::Result<bool>;

    /// Retrieve the blob with the given key, or None if it doesn't exist.
    async fn get(&self, key: &str) -> io::Result<Option<Bytes>>;

    /// Insert a blob, replacing an existing one with the same key.
    async fn put(&self, key: &str, data: Bytes) -> io::Result<()>;

    /// Delete the blob with the given key.
    /// Returns false if there was nothing to delete.
    async fn delete(&self, key: &str) -> io::Result<bool>;

    /// List all blobs in the store, in no particular order.
    fn list(&self) -> BoxStream<'_, io::Result<BlobMeta>>;
}

#[async_trait]
impl<A> BlobStore for A
where
    A: AsRef<dyn BlobStore> + Send + Sync,
{
    async fn has(&self, key: &str) -> io::Result<bool> {
        self.as_ref().has(key).await
    }

    async fn get(&self, key: &str) -> io::Result<Option<Bytes>> {
        self.as_ref().get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> io::Result<()> {
        self.as_ref().put(key, data).await
    }

    async fn delete(&self, key: &str) -> io::Result<bool> {
        self.as_ref().delete(key).await
    }

    fn list(&self) -> BoxStream<'_, io::Result<BlobMeta>> {
        self.as_ref().list()
    }
}
