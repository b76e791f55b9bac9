use std::{io, sync::Arc};

use bytes::Bytes;
use tonic::async_trait;
use tracing::{debug, instrument, warn};

use super::ImageService;
use crate::blobstore::BlobStore;
use crate::{Handle, Tier};

/// How often [TieredImageService::store] retries when a freshly generated
/// handle is already taken, before giving up.
const MAX_HANDLE_ATTEMPTS: usize = 16;

/// An [ImageService] dispatching to one [BlobStore] per [Tier].
#[derive(Clone)]
pub struct TieredImageService {
    inmemory: Arc<dyn BlobStore>,
    persistent: Arc<dyn BlobStore>,
}

impl TieredImageService {
    pub fn new(inmemory: Arc<dyn BlobStore>, persistent: Arc<dyn BlobStore>) -> Self {
        Self {
            inmemory,
            persistent,
        }
    }

    /// The blob store backing the given tier.
    pub fn tier(&self, tier: Tier) -> &Arc<dyn BlobStore> {
        match tier {
            Tier::InMemory => &self.inmemory,
            Tier::Persistent => &self.persistent,
        }
    }
}

#[async_trait]
impl ImageService for TieredImageService {
    #[instrument(skip(self), fields(handle=%handle), err)]
    async fn read(&self, handle: &Handle) -> io::Result<Option<Bytes>> {
        self.tier(handle.tier()).get(handle.key()).await
    }

    #[instrument(skip(self, payload), fields(tier=%tier, blob.size=payload.len()), err)]
    async fn store(&self, tier: Tier, payload: Bytes) -> io::Result<Handle> {
        let blob_store = self.tier(tier);

        for _ in 0..MAX_HANDLE_ATTEMPTS {
            let handle = Handle::generate(tier, &payload);
            if blob_store.has(handle.key()).await? {
                warn!(handle=%handle, "generated handle already in use, retrying");
                continue;
            }

            blob_store.put(handle.key(), payload).await?;
            debug!(handle=%handle, "stored blob");

            return Ok(handle);
        }

        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("unable to allocate a free handle in tier {}", tier),
        ))
    }

    #[instrument(skip(self), fields(handle=%handle), err)]
    async fn remove(&self, handle: &Handle) -> io::Result<bool> {
        self.tier(handle.tier()).delete(handle.key()).await
    }
}
