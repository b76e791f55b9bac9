use std::sync::atomic::{AtomicUsize, Ordering};

use lazy_static::lazy_static;
use tempfile::TempDir;

use crate::blobstore::{self, BlobStore};

lazy_static! {
    static ref TMPDIR: TempDir = TempDir::new().unwrap();
}

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Constructs an object_store backed [BlobStore] on the local filesystem.
/// Every call gets its own directory below a shared [TempDir].
pub async fn make_local_fs_blob_store() -> Box<dyn BlobStore> {
    let dir = TMPDIR
        .path()
        .join(COUNTER.fetch_add(1, Ordering::Relaxed).to_string());

    blobstore::from_addr(&format!("objectstore+file://{}", dir.display()))
        .await
        .unwrap()
}
