//! Constructors providing instances of a BlobStore and ImageService, and an
//! in-process gRPC server/client pair.
//! Only used for testing purposes, but across modules.

use std::sync::Arc;

use hyper_util::rt::TokioIo;
use tonic::transport::{Channel, Endpoint, Server, Uri};

use crate::{
    blobstore::{BlobStore, MemoryBlobStore},
    imageservice::{ImageService, TieredImageService},
    proto::{
        image_store_client::ImageStoreClient, image_store_server::ImageStoreServer,
        GRPCImageStoreWrapper,
    },
};

pub fn gen_blob_store() -> Arc<dyn BlobStore> {
    Arc::new(MemoryBlobStore::default())
}

/// An [ImageService] with both tiers in memory.
pub fn gen_image_service() -> Arc<dyn ImageService> {
    Arc::new(TieredImageService::new(gen_blob_store(), gen_blob_store()))
}

/// Spins up a gRPC server exposing `image_service`, connected through a
/// [tokio::io::DuplexStream], and returns a client connected to it.
pub async fn gen_imagestore_grpc_client(
    image_service: Arc<dyn ImageService>,
) -> ImageStoreClient<Channel> {
    gen_imagestore_grpc_client_for(GRPCImageStoreWrapper::new(image_service)).await
}

/// Like [gen_imagestore_grpc_client], for an already configured wrapper.
pub async fn gen_imagestore_grpc_client_for(
    wrapper: GRPCImageStoreWrapper<Arc<dyn ImageService>>,
) -> ImageStoreClient<Channel> {
    let (left, right) = tokio::io::duplex(64 * 1024);

    // spin up a server, which will only connect once, to the left side.
    tokio::spawn(async move {
        let mut server = Server::builder();
        let router = server.add_service(ImageStoreServer::new(wrapper));

        router
            .serve_with_incoming(tokio_stream::once(Ok::<_, std::io::Error>(left)))
            .await
    });

    // Create a client, connecting to the right side. The URI is unused.
    let mut maybe_right = Some(right);

    ImageStoreClient::new(
        Endpoint::try_from("http://[::]:50055")
            .expect("valid endpoint")
            .connect_with_connector(tower::service_fn(move |_: Uri| {
                let right = maybe_right.take();
                async move {
                    right.map(TokioIo::new).ok_or_else(|| {
                        std::io::Error::new(std::io::ErrorKind::AddrInUse, "already connected")
                    })
                }
            }))
            .await
            .expect("connect to in-process server"),
    )
}
