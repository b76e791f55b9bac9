use std::{collections::HashMap, io, sync::Arc, time::SystemTime};

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use tonic::async_trait;
use tracing::instrument;

use super::{BlobMeta, BlobStore};

struct Entry {
    data: Bytes,
    last_modified: SystemTime,
}

#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    db: Arc<RwLock<HashMap<String, Entry>>>,
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    #[instrument(skip(self))]
    async fn has(&self, key: &str) -> io::Result<bool> {
        Ok(self.db.read().contains_key(key))
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> io::Result<Option<Bytes>> {
        // Bytes clones are cheap, they only bump a refcount.
        Ok(self.db.read().get(key).map(|e| e.data.clone()))
    }

    #[instrument(skip(self, data), fields(blob.size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> io::Result<()> {
        self.db.write().insert(
            key.to_string(),
            Entry {
                data,
                last_modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> io::Result<bool> {
        Ok(self.db.write().remove(key).is_some())
    }

    fn list(&self) -> BoxStream<'_, io::Result<BlobMeta>> {
        // Take a snapshot, so we don't hold the lock while the stream is consumed.
        let metas: Vec<_> = self
            .db
            .read()
            .iter()
            .map(|(key, entry)| {
                Ok(BlobMeta {
                    key: key.clone(),
                    size: entry.data.len() as u64,
                    last_modified: entry.last_modified,
                })
            })
            .collect();

        stream::iter(metas).boxed()
    }
}
