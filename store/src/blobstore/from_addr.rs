use url::Url;

use crate::Error;

use super::{BlobStore, MemoryBlobStore, ObjectStoreBlobStore};

/// Constructs a new instance of a [BlobStore] from an URI.
///
/// The following schemes are supported by the following stores:
/// - `memory://` ([MemoryBlobStore])
/// - `objectstore+*://` ([ObjectStoreBlobStore])
///
/// See their `from_url` methods for more details about their syntax.
pub async fn from_addr(uri: &str) -> Result<Box<dyn BlobStore>, crate::Error> {
    let url = Url::parse(uri)
        .map_err(|e| crate::Error::StorageError(format!("unable to parse url: {}", e)))?;

    let blob_store: Box<dyn BlobStore> = match url.scheme() {
        "memory" => {
            // memory doesn't support host or path in the URL.
            if url.has_host() || !url.path().is_empty() {
                return Err(Error::StorageError("invalid url".to_string()));
            }
            Box::<MemoryBlobStore>::default()
        }
        scheme if scheme.starts_with("objectstore+") => {
            // We need to convert the URL to string, strip the prefix there, and then
            // parse it back as url, as Url::set_scheme() rejects some of the transitions we want to do.
            let trimmed_url = {
                let s = url.to_string();
                let s = s.strip_prefix("objectstore+").unwrap_or(&s);
                Url::parse(s).map_err(|e| {
                    Error::StorageError(format!("unable to parse object store url: {}", e))
                })?
            };
            Box::new(ObjectStoreBlobStore::parse_url(&trimmed_url)?)
        }
        scheme => {
            return Err(crate::Error::StorageError(format!(
                "unknown scheme: {}",
                scheme
            )))
        }
    };

    Ok(blob_store)
}

#[cfg(test)]
mod tests {
    use super::from_addr;
    use rstest::rstest;

    #[rstest]
    /// This uses an unsupported scheme.
    #[case::unsupported_scheme("http://foo.example/test", false)]
    /// This correctly sets the scheme, and doesn't set a path.
    #[case::memory_valid("memory://", true)]
    /// This sets a memory url host to `foo`
    #[case::memory_invalid_host("memory://foo", false)]
    /// This sets a memory url path to "/", which is invalid.
    #[case::memory_invalid_root_path("memory:///", false)]
    /// This sets a memory url path to "/foo", which is invalid.
    #[case::memory_invalid_root_path_foo("memory:///foo", false)]
    /// An example for object store (InMemory)
    #[case::objectstore_valid_memory("objectstore+memory:///", true)]
    /// An example for object store (LocalFileSystem)
    #[case::objectstore_valid_file("objectstore+file:///var/lib/imagestore", true)]
    /// The gRPC scheme is only valid for image services, not tier backends.
    #[case::grpc_not_a_blob_store("grpc+http://[::1]:50055", false)]
    /// Not an URL at all.
    #[case::garbage("inmemory", false)]
    #[tokio::test]
    async fn test_from_addr_tokio(#[case] uri_str: &str, #[case] exp_succeed: bool) {
        if exp_succeed {
            from_addr(uri_str).await.expect("should succeed");
        } else {
            assert!(from_addr(uri_str).await.is_err(), "should fail");
        }
    }

    #[cfg(feature = "cloud")]
    #[rstest]
    /// An example for object store (S3)
    #[case::objectstore_valid_s3("objectstore+s3://bucket/path", true)]
    /// An example for object store (GCS)
    #[case::objectstore_valid_gcs("objectstore+gs://bucket/path", true)]
    #[tokio::test]
    async fn test_from_addr_tokio_cloud(#[case] uri_str: &str, #[case] exp_succeed: bool) {
        if exp_succeed {
            from_addr(uri_str).await.expect("should succeed");
        } else {
            assert!(from_addr(uri_str).await.is_err(), "should fail");
        }
    }
}
