//! A client talking to a remote ImageStore, using plain strings for handles
//! and tiers.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::instrument;

use crate::imageservice::{GRPCImageService, ImageService};
use crate::proto::image_store_client;
use crate::tls::TlsPaths;
use crate::tonic::{channel_from_url_with, ChannelOptions};
use crate::{Handle, Tier};

/// Per-request timeout used unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] crate::handle::Error),

    #[error("{0} not found")]
    NotFound(Handle),

    #[error("{0} returned different contents than stored")]
    ContentMismatch(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("unable to load TLS config: {0}")]
    Tls(#[from] crate::tls::Error),

    #[error("unable to connect: {0}")]
    Channel(#[from] crate::tonic::Error),
}

/// Everything needed to connect to an ImageStore.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Address of the store, see [crate::tonic::channel_from_url_with].
    pub url: url::Url,

    /// Certificates for mutual TLS. Required for `grpc+https` URLs.
    pub tls: Option<TlsPaths>,

    /// The name the server certificate is checked against.
    /// Defaults to the host of [Self::url].
    pub domain_name: Option<String>,

    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(url: url::Url) -> Self {
        Self {
            url,
            tls: None,
            domain_name: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Clone)]
pub struct ImageStoreClient {
    image_service: Arc<dyn ImageService>,
}

impl ImageStoreClient {
    /// Connects to the store described by `config`.
    /// The connection itself is established lazily, unless the URL asks for
    /// `wait-connect=1`.
    #[instrument(skip_all, fields(url=%config.url), err)]
    pub async fn connect(config: &ClientConfig) -> Result<Self, Error> {
        let tls = match &config.tls {
            Some(paths) => {
                let domain_name = config
                    .domain_name
                    .as_deref()
                    .or_else(|| config.url.host_str())
                    .unwrap_or("localhost");

                Some(paths.client_config(domain_name).await?)
            }
            None => None,
        };

        let channel = channel_from_url_with(
            &config.url,
            &ChannelOptions {
                tls,
                timeout: Some(config.timeout),
            },
        )
        .await?;

        Ok(Self::from_client(
            image_store_client::ImageStoreClient::new(channel),
        ))
    }

    /// Wraps an already connected gRPC client.
    pub fn from_client(
        grpc_client: image_store_client::ImageStoreClient<tonic::transport::Channel>,
    ) -> Self {
        Self::from_service(Arc::new(GRPCImageService::from_client(grpc_client)))
    }

    /// Uses any [ImageService], local or remote.
    pub fn from_service(image_service: Arc<dyn ImageService>) -> Self {
        Self { image_service }
    }

    /// Reads the blob identified by `handle`.
    #[instrument(skip(self), err)]
    pub async fn read(&self, handle: &str) -> Result<Bytes, Error> {
        let handle: Handle = handle.parse()?;

        match self.image_service.read(&handle).await? {
            Some(data) => Ok(data),
            None => Err(Error::NotFound(handle)),
        }
    }

    /// Stores `payload` in the tier labelled `tier`, and returns the handle.
    #[instrument(skip(self, payload), fields(blob.size=payload.len()), err)]
    pub async fn store(&self, payload: Bytes, tier: &str) -> Result<String, Error> {
        let tier: Tier = tier.parse()?;

        Ok(self.image_service.store(tier, payload).await?.to_string())
    }

    /// Removes the blob identified by `handle`.
    #[instrument(skip(self), err)]
    pub async fn remove(&self, handle: &str) -> Result<(), Error> {
        let handle: Handle = handle.parse()?;

        if self.image_service.remove(&handle).await? {
            Ok(())
        } else {
            Err(Error::NotFound(handle))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::{ClientConfig, Error, ImageStoreClient, DEFAULT_TIMEOUT};
    use crate::fixtures::{BLOB_A, BLOB_C};
    use crate::tls::TlsPaths;
    use crate::utils::{gen_image_service, gen_imagestore_grpc_client};

    async fn gen_client() -> ImageStoreClient {
        ImageStoreClient::from_client(gen_imagestore_grpc_client(gen_image_service()).await)
    }

    /// The sequence the smoke test runs: read, store, remove.
    #[tokio::test]
    async fn read_store_remove() {
        let client = gen_client().await;

        let err = client.read("inmem_335afcab").await.expect_err("must fail");
        assert!(matches!(err, Error::NotFound(_)));

        let handle = client
            .store(Bytes::new(), "inmemory")
            .await
            .expect("must succeed");
        assert!(handle.starts_with("inmem_"));

        assert_eq!(Bytes::new(), client.read(&handle).await.expect("must succeed"));

        client.remove(&handle).await.expect("must succeed");

        let err = client.remove(&handle).await.expect_err("must fail");
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn persistent_multi_chunk() {
        let client = gen_client().await;

        let handle = client
            .store(BLOB_C.clone(), "persistent")
            .await
            .expect("must succeed");
        assert!(handle.starts_with("persist_"));

        assert_eq!(BLOB_C.clone(), client.read(&handle).await.expect("must succeed"));
    }

    #[tokio::test]
    async fn invalid_arguments() {
        let client = gen_client().await;

        let err = client
            .store(BLOB_A.clone(), "redis")
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = client.read("335afcab").await.expect_err("must fail");
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = client.remove("inmem_").await.expect_err("must fail");
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn config_defaults() {
        let config = ClientConfig::new("grpc+https://localhost:50055".parse().unwrap());

        assert_eq!(DEFAULT_TIMEOUT, config.timeout);
        assert_eq!(Duration::from_secs(1), config.timeout);
        assert!(config.tls.is_none());
    }

    /// Missing certificates are reported before any connection attempt.
    #[tokio::test]
    async fn connect_missing_certs() {
        let tmpdir = tempfile::TempDir::new().unwrap();

        let mut config = ClientConfig::new("grpc+https://localhost:50055".parse().unwrap());
        config.tls = Some(TlsPaths {
            ca_cert: tmpdir.path().join("ca_certificate.pem"),
            cert: tmpdir.path().join("client_certificate.pem"),
            key: tmpdir.path().join("client_key.pem"),
        });

        let err = ImageStoreClient::connect(&config)
            .await
            .err()
            .expect("must fail");
        assert!(matches!(err, Error::Tls(_)));
    }

    /// Plaintext connections are lazy, so this succeeds without a server.
    #[tokio::test]
    async fn connect_plaintext_lazy() {
        let config = ClientConfig::new("grpc+http://[::1]:50055".parse().unwrap());

        ImageStoreClient::connect(&config)
            .await
            .expect("must succeed");
    }
}
