use std::{io, sync::Arc, time::SystemTime};

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use object_store::{path::Path, ObjectStore};
use tonic::async_trait;
use tracing::{debug, instrument, Level};
use url::Url;

use super::{BlobMeta, BlobStore};

/// Uses any object storage supported by the [object_store] crate to provide
/// a [BlobStore]. This backs the persistent tier.
///
/// # Data format
/// Each blob is stored as-is at `${base_path}/images/${key}`. There's no
/// index or additional metadata, the object's own modification time is what
/// the retention policy looks at.
#[derive(Clone)]
pub struct ObjectStoreBlobStore {
    object_store: Arc<dyn ObjectStore>,
    base_path: Path,
}

impl ObjectStoreBlobStore {
    /// Constructs a new [ObjectStoreBlobStore] from a [Url] supported by
    /// [object_store].
    /// Any path suffix becomes the base path of the object store.
    /// additional options, the same as in [object_store::parse_url_opts] can
    /// be passed.
    pub fn parse_url_opts<I, K, V>(url: &Url, options: I) -> Result<Self, object_store::Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let (object_store, path) = object_store::parse_url_opts(url, options)?;

        Ok(Self {
            object_store: Arc::new(object_store),
            base_path: path,
        })
    }

    /// Like [Self::parse_url_opts], except without the options.
    pub fn parse_url(url: &Url) -> Result<Self, object_store::Error> {
        Self::parse_url_opts(url, Vec::<(String, String)>::new())
    }

    fn images_path(&self) -> Path {
        self.base_path.child("images")
    }
}

#[instrument(level=Level::TRACE, skip_all, fields(base_path=%base_path, blob.key=key), ret(Display))]
fn derive_blob_path(base_path: &Path, key: &str) -> Path {
    base_path.child("images").child(key)
}

#[async_trait]
impl BlobStore for ObjectStoreBlobStore {
    #[instrument(skip_all, ret, err, fields(blob.key=key))]
    async fn has(&self, key: &str) -> io::Result<bool> {
        let p = derive_blob_path(&self.base_path, key);

        match self.object_store.head(&p).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e)?,
        }
    }

    #[instrument(skip_all, err, fields(blob.key=key))]
    async fn get(&self, key: &str) -> io::Result<Option<Bytes>> {
        let p = derive_blob_path(&self.base_path, key);

        match self.object_store.get(&p).await {
            Ok(res) => Ok(Some(res.bytes().await?)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e)?,
        }
    }

    #[instrument(skip_all, err, fields(blob.key=key, blob.size=data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> io::Result<()> {
        let p = derive_blob_path(&self.base_path, key);

        debug!(blob.path=%p, "uploading blob");
        self.object_store.put(&p, data.into()).await?;

        Ok(())
    }

    #[instrument(skip_all, ret, err, fields(blob.key=key))]
    async fn delete(&self, key: &str) -> io::Result<bool> {
        let p = derive_blob_path(&self.base_path, key);

        // Not all backends report deleting a missing object as an error,
        // so check for existence first.
        match self.object_store.head(&p).await {
            Ok(_) => {}
            Err(object_store::Error::NotFound { .. }) => return Ok(false),
            Err(e) => Err(e)?,
        }

        match self.object_store.delete(&p).await {
            Ok(()) => Ok(true),
            // raced with another delete
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e)?,
        }
    }

    fn list(&self) -> BoxStream<'_, io::Result<BlobMeta>> {
        self.object_store
            .list(Some(&self.images_path()))
            .filter_map(|res| async move {
                match res {
                    Ok(meta) => {
                        let key = meta.location.filename()?.to_string();
                        Some(Ok(BlobMeta {
                            key,
                            size: meta.size as u64,
                            last_modified: SystemTime::from(meta.last_modified),
                        }))
                    }
                    // The images directory not existing yet means no blobs.
                    Err(object_store::Error::NotFound { .. }) => None,
                    Err(e) => Some(Err(io::Error::from(e))),
                }
            })
            .boxed()
    }
}
