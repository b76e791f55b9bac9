use std::io;

use bytes::Bytes;
use tonic::async_trait;

use crate::{Handle, Tier};

mod grpc;
mod tiered;

#[cfg(test)]
pub mod tests;

pub use self::grpc::GRPCImageService;
pub use self::tiered::TieredImageService;

/// The base trait all ImageService implementations need to implement.
/// It provides functions to read, store and remove blobs by their
/// [Handle].
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Retrieve the blob identified by the handle, or None if it's unknown.
    async fn read(&self, handle: &Handle) -> io::Result<Option<Bytes>>;

    /// Store a blob in the given tier, returning a newly allocated handle.
    async fn store(&self, tier: Tier, payload: Bytes) -> io::Result<Handle>;

    /// Remove the blob identified by the handle.
    /// Returns false if the handle was unknown.
    async fn remove(&self, handle: &Handle) -> io::Result<bool>;
}

#[async_trait]
impl<A> ImageService for A
where
    A: AsRef<dyn ImageService> + Send + Sync,
{
    async fn read(&self, handle: &Handle) -> io::Result<Option<Bytes>> {
        self.as_ref().read(handle).await
    }

    async fn store(&self, tier: Tier, payload: Bytes) -> io::Result<Handle> {
        self.as_ref().store(tier, payload).await
    }

    async fn remove(&self, handle: &Handle) -> io::Result<bool> {
        self.as_ref().remove(handle).await
    }
}
