//! Loading of PEM encoded certificates and keys into tonic TLS configs.
//!
//! Both sides authenticate each other: the client presents its certificate
//! to the server, and the server only accepts clients signed by the CA.

use std::path::{Path, PathBuf};

use tonic::transport::{Certificate, ClientTlsConfig, Identity, ServerTlsConfig};
use tracing::{debug, instrument};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to read {what} from {}: {source}", .path.display())]
    Read {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{what} at {} does not contain a PEM block", .path.display())]
    NotPem { what: &'static str, path: PathBuf },
}

/// Paths to the PEM files making up one side of a mutually authenticated
/// TLS connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsPaths {
    /// The CA certificate the peer's certificate must be signed by.
    pub ca_cert: PathBuf,
    /// Our own certificate.
    pub cert: PathBuf,
    /// The private key belonging to [Self::cert].
    pub key: PathBuf,
}

/// Reads a PEM file, and makes sure it at least looks like one.
/// The actual parsing only happens during the TLS handshake.
async fn read_pem(what: &'static str, path: &Path) -> Result<Vec<u8>, Error> {
    let data = tokio::fs::read(path).await.map_err(|source| Error::Read {
        what,
        path: path.to_owned(),
        source,
    })?;

    if !data.windows(b"-----BEGIN ".len()).any(|w| w == b"-----BEGIN ") {
        return Err(Error::NotPem {
            what,
            path: path.to_owned(),
        });
    }

    debug!(what, path=%path.display(), "loaded PEM file");
    Ok(data)
}

impl TlsPaths {
    async fn load(&self) -> Result<(Certificate, Identity), Error> {
        let ca_cert = read_pem("CA certificate", &self.ca_cert).await?;
        let cert = read_pem("certificate", &self.cert).await?;
        let key = read_pem("private key", &self.key).await?;

        Ok((
            Certificate::from_pem(ca_cert),
            Identity::from_pem(cert, key),
        ))
    }

    /// Builds the config for a client connecting to `domain_name`.
    /// The server certificate must be issued for that name.
    #[instrument(skip(self), err)]
    pub async fn client_config(&self, domain_name: &str) -> Result<ClientTlsConfig, Error> {
        let (ca_cert, identity) = self.load().await?;

        Ok(ClientTlsConfig::new()
            .ca_certificate(ca_cert)
            .identity(identity)
            .domain_name(domain_name))
    }

    /// Builds the config for a server requiring client certificates signed
    /// by the CA.
    #[instrument(skip(self), err)]
    pub async fn server_config(&self) -> Result<ServerTlsConfig, Error> {
        let (ca_cert, identity) = self.load().await?;

        Ok(ServerTlsConfig::new()
            .identity(identity)
            .client_ca_root(ca_cert))
    }
}
