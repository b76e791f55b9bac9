use std::sync::Arc;

use crate::blobstore;
use crate::imageservice::{GRPCImageService, ImageService, TieredImageService};
use crate::utils::{gen_image_service, gen_imagestore_grpc_client};

/// A [TieredImageService] with an in-memory tier and an object_store backed
/// persistent tier.
pub async fn make_tiered_image_service() -> Box<dyn ImageService> {
    let inmemory = blobstore::from_addr("memory://").await.unwrap();
    let persistent = blobstore::from_addr("objectstore+memory:///").await.unwrap();

    Box::new(TieredImageService::new(
        Arc::from(inmemory),
        Arc::from(persistent),
    ))
}

/// Constructs and returns a gRPC ImageService.
/// The server part is a [TieredImageService] in memory, exposed via the
/// [crate::proto::GRPCImageStoreWrapper].
pub async fn make_grpc_image_service() -> Box<dyn ImageService> {
    Box::new(GRPCImageService::from_client(
        gen_imagestore_grpc_client(gen_image_service()).await,
    ))
}
