use std::time::Duration;

use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

fn url_wants_wait_connect(url: &url::Url) -> bool {
    url.query_pairs()
        .filter(|(k, v)| k == "wait-connect" && v == "1")
        .count()
        > 0
}

/// Options applied to the [Endpoint] when constructing a [Channel].
#[derive(Clone, Debug, Default)]
pub struct ChannelOptions {
    /// TLS configuration, used for `grpc+https` URLs.
    pub tls: Option<ClientTlsConfig>,

    /// Timeout applied to every request on the channel.
    pub timeout: Option<Duration>,
}

impl ChannelOptions {
    fn apply(&self, mut endpoint: Endpoint) -> Result<Endpoint, Error> {
        if let Some(tls) = &self.tls {
            endpoint = endpoint.tls_config(tls.clone())?;
        }
        if let Some(timeout) = self.timeout {
            endpoint = endpoint.timeout(timeout);
        }
        Ok(endpoint)
    }
}

/// Like [channel_from_url_with], with default [ChannelOptions].
pub async fn channel_from_url(url: &url::Url) -> Result<Channel, self::Error> {
    channel_from_url_with(url, &ChannelOptions::default()).await
}

/// Turn a [url::Url] to a [Channel] if it can be parsed successfully.
/// It supports the following schemes (and URLs):
///  - `grpc+http://[::1]:50055`, connecting over unencrypted HTTP/2 (h2c)
///  - `grpc+https://localhost:50055`, connecting over encrypted HTTP/2
///  - `grpc+unix:/path/to/socket`, connecting to a unix domain socket
///
/// All URLs support adding `wait-connect=1` as a URL parameter, in which case
/// the connection is established eagerly.
///
/// Setting a TLS config for anything other than `grpc+https` is an error.
pub async fn channel_from_url_with(
    url: &url::Url,
    options: &ChannelOptions,
) -> Result<Channel, self::Error> {
    if options.tls.is_some() && url.scheme() != "grpc+https" {
        return Err(Error::TlsRequiresHttps());
    }

    match url.scheme() {
        "grpc+unix" => {
            if url.host_str().is_some() {
                return Err(Error::HostSetForUnixSocket());
            }

            let connector = tower::service_fn({
                let url = url.clone();
                move |_: tonic::transport::Uri| {
                    let path = url.path().to_string();
                    async move {
                        Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(path).await?))
                    }
                }
            });

            // the URL doesn't matter
            let endpoint = options.apply(Endpoint::from_static("http://[::]:50055"))?;
            if url_wants_wait_connect(url) {
                Ok(endpoint.connect_with_connector(connector).await?)
            } else {
                Ok(endpoint.connect_with_connector_lazy(connector))
            }
        }
        _ => {
            // ensure path is empty, not supported with gRPC.
            if !url.path().is_empty() {
                return Err(Error::PathMayNotBeSet());
            }

            // Stringify the URL and remove the grpc+ prefix.
            // We can't use `url.set_scheme(rest)`, as it disallows
            // setting something http(s) that previously wasn't.
            let unprefixed_url_str = match url.to_string().strip_prefix("grpc+") {
                None => return Err(Error::MissingGRPCPrefix()),
                Some(url_str) => url_str.to_owned(),
            };

            // Use the regular tonic transport::Endpoint logic, but unprefixed_url_str,
            // as tonic doesn't know about grpc+http[s].
            let endpoint = options.apply(Endpoint::try_from(unprefixed_url_str)?)?;
            if url_wants_wait_connect(url) {
                Ok(endpoint.connect().await?)
            } else {
                Ok(endpoint.connect_lazy())
            }
        }
    }
}

/// Errors occuring when trying to connect to a backend
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("grpc+ prefix is missing from URL")]
    MissingGRPCPrefix(),

    #[error("host may not be set for unix domain sockets")]
    HostSetForUnixSocket(),

    #[error("path may not be set")]
    PathMayNotBeSet(),

    #[error("TLS can only be used with grpc+https URLs")]
    TlsRequiresHttps(),

    #[error("transport error: {0}")]
    TransportError(tonic::transport::Error),
}

impl From<tonic::transport::Error> for Error {
    fn from(value: tonic::transport::Error) -> Self {
        Self::TransportError(value)
    }
}
