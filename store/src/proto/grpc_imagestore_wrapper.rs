use std::ops::Deref;

use bytes::BytesMut;
use futures::stream::BoxStream;
use tonic::{async_trait, Request, Response, Status, Streaming};
use tracing::{field::Empty, instrument, warn, Span};

use super::chunk_payload;
use crate::imageservice::ImageService;
use crate::{Error, Handle, Tier};

pub struct GRPCImageStoreWrapper<T> {
    image_service: T,
    max_blob_size: Option<usize>,
}

impl<T> GRPCImageStoreWrapper<T> {
    pub fn new(image_service: T) -> Self {
        Self {
            image_service,
            max_blob_size: None,
        }
    }

    /// Rejects stores of blobs larger than `max_blob_size` bytes with
    /// `RESOURCE_EXHAUSTED`, before buffering more than that.
    pub fn with_max_blob_size(mut self, max_blob_size: usize) -> Self {
        self.max_blob_size = Some(max_blob_size);
        self
    }
}

fn parse_handle(s: &str) -> Result<Handle, Status> {
    s.parse::<Handle>().map_err(|e| Error::from(e).into())
}

fn parse_tier(s: &str) -> Result<Tier, Status> {
    s.parse::<Tier>().map_err(|e| Error::from(e).into())
}

#[async_trait]
impl<T> super::image_store_server::ImageStore for GRPCImageStoreWrapper<T>
where
    T: Deref<Target = dyn ImageService> + Send + Sync + 'static,
{
    // https://github.com/tokio-rs/tokio/issues/2723#issuecomment-1534723933
    type ReadStream = BoxStream<'static, Result<super::ReadResponse, Status>>;

    #[instrument(skip_all, fields(handle=%request.get_ref().handle))]
    async fn read(
        &self,
        request: Request<super::ReadRequest>,
    ) -> Result<Response<Self::ReadStream>, Status> {
        let handle = parse_handle(&request.into_inner().handle)?;

        match self.image_service.read(&handle).await {
            Ok(Some(data)) => {
                let chunks_stream = futures::stream::iter(
                    chunk_payload(data).map(|chunk| Ok(super::ReadResponse { chunk })),
                );
                Ok(Response::new(Box::pin(chunks_stream)))
            }
            Ok(None) => Err(Status::not_found(format!("handle {} not found", handle))),
            Err(e) => {
                warn!(err=%e, "error reading blob");
                Err(Error::from(e).into())
            }
        }
    }

    /// The tier needs to be set on the first message. Later messages may
    /// repeat it, but not change it.
    #[instrument(skip_all, fields(tier = Empty, blob.size = Empty, handle = Empty))]
    async fn store(
        &self,
        request: Request<Streaming<super::StoreRequest>>,
    ) -> Result<Response<super::StoreResponse>, Status> {
        let mut stream = request.into_inner();

        let mut tier: Option<Tier> = None;
        let mut buf = BytesMut::new();

        while let Some(msg) = stream.message().await? {
            match (tier, msg.tier.is_empty()) {
                (None, true) => {
                    return Err(Status::invalid_argument(
                        "tier must be set on the first message",
                    ))
                }
                (None, false) => tier = Some(parse_tier(&msg.tier)?),
                (Some(tier), false) if tier.as_str() != msg.tier => {
                    return Err(Status::invalid_argument(format!(
                        "tier changed from {} to {:?} within a single store",
                        tier, msg.tier
                    )))
                }
                (Some(_), _) => {}
            }

            if let Some(max_blob_size) = self.max_blob_size {
                if buf.len() + msg.chunk.len() > max_blob_size {
                    return Err(Error::TooLarge(max_blob_size).into());
                }
            }

            buf.extend_from_slice(&msg.chunk);
        }

        // an empty stream never told us where to put the blob.
        let tier = tier.ok_or_else(|| Status::invalid_argument("missing tier"))?;

        let span = Span::current();
        span.record("tier", tier.as_str());
        span.record("blob.size", buf.len());

        let handle = self
            .image_service
            .store(tier, buf.freeze())
            .await
            .map_err(|e| {
                warn!(err=%e, "error storing blob");
                Status::from(Error::from(e))
            })?;

        span.record("handle", tracing::field::display(&handle));

        Ok(Response::new(super::StoreResponse {
            handle: handle.to_string(),
        }))
    }

    #[instrument(skip_all, fields(handle=%request.get_ref().handle))]
    async fn remove(
        &self,
        request: Request<super::RemoveRequest>,
    ) -> Result<Response<super::RemoveResponse>, Status> {
        let handle = parse_handle(&request.into_inner().handle)?;

        match self.image_service.remove(&handle).await {
            Ok(true) => Ok(Response::new(super::RemoveResponse {})),
            Ok(false) => Err(Status::not_found(format!("handle {} not found", handle))),
            Err(e) => {
                warn!(err=%e, "error removing blob");
                Err(Error::from(e).into())
            }
        }
    }
}
