use std::io;

use bytes::{Bytes, BytesMut};
use tonic::{async_trait, transport::Channel, Code, Status};
use tracing::instrument;

use super::ImageService;
use crate::proto::{self, chunk_payload};
use crate::{Handle, Tier};

/// Connects to a (remote) ImageStore over gRPC.
#[derive(Clone)]
pub struct GRPCImageService {
    /// The internal reference to a gRPC client.
    /// Cloning it is cheap, and it internally handles concurrent requests.
    grpc_client: proto::image_store_client::ImageStoreClient<Channel>,
}

impl GRPCImageService {
    /// construct a [GRPCImageService] from a [proto::image_store_client::ImageStoreClient].
    /// panics if called outside the context of a tokio runtime.
    pub fn from_client(grpc_client: proto::image_store_client::ImageStoreClient<Channel>) -> Self {
        Self { grpc_client }
    }
}

/// Maps a [Status] received from the server to an [io::Error], keeping the
/// distinction between bad requests and everything else.
fn status_to_io_error(status: Status) -> io::Error {
    let kind = match status.code() {
        Code::InvalidArgument => io::ErrorKind::InvalidInput,
        Code::NotFound => io::ErrorKind::NotFound,
        Code::DeadlineExceeded => io::ErrorKind::TimedOut,
        Code::Unavailable => io::ErrorKind::ConnectionRefused,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, status)
}

#[async_trait]
impl ImageService for GRPCImageService {
    #[instrument(skip(self), fields(handle=%handle), err)]
    async fn read(&self, handle: &Handle) -> io::Result<Option<Bytes>> {
        let resp = self
            .grpc_client
            .clone()
            .read(proto::ReadRequest {
                handle: handle.to_string(),
            })
            .await;

        match resp {
            Ok(stream) => {
                let mut stream = stream.into_inner();
                let mut buf = BytesMut::new();

                while let Some(resp) = stream.message().await.map_err(status_to_io_error)? {
                    buf.extend_from_slice(&resp.chunk);
                }

                Ok(Some(buf.freeze()))
            }
            Err(e) if e.code() == Code::NotFound => Ok(None),
            Err(e) => Err(status_to_io_error(e)),
        }
    }

    /// Sends the payload in chunks of [proto::CHUNK_SIZE].
    /// The tier is set on the first message only, an empty payload is sent as
    /// a single empty chunk, so the tier still reaches the server.
    #[instrument(skip(self, payload), fields(tier=%tier, blob.size=payload.len()), err)]
    async fn store(&self, tier: Tier, payload: Bytes) -> io::Result<Handle> {
        let mut chunks: Vec<Bytes> = chunk_payload(payload).collect();
        if chunks.is_empty() {
            chunks.push(Bytes::new());
        }

        let requests = chunks
            .into_iter()
            .enumerate()
            .map(move |(i, chunk)| proto::StoreRequest {
                chunk,
                tier: if i == 0 {
                    tier.as_str().to_string()
                } else {
                    String::new()
                },
            });

        let resp = self
            .grpc_client
            .clone()
            .store(tokio_stream::iter(requests))
            .await
            .map_err(status_to_io_error)?
            .into_inner();

        let handle: Handle = resp
            .handle
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if handle.tier() != tier {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("requested tier {}, but got handle {}", tier, handle),
            ));
        }

        Ok(handle)
    }

    #[instrument(skip(self), fields(handle=%handle), err)]
    async fn remove(&self, handle: &Handle) -> io::Result<bool> {
        let resp = self
            .grpc_client
            .clone()
            .remove(proto::RemoveRequest {
                handle: handle.to_string(),
            })
            .await;

        match resp {
            Ok(_) => Ok(true),
            Err(e) if e.code() == Code::NotFound => Ok(false),
            Err(e) => Err(status_to_io_error(e)),
        }
    }
}
