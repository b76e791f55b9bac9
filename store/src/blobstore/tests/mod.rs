//! This contains test scenarios that a given [BlobStore] needs to pass.
//! We use [rstest] and [rstest_reuse] to provide all stores we want to test
//! against, and then apply this template to all test functions.

use std::time::{Duration, SystemTime};

use futures::TryStreamExt;
use rstest::*;
use rstest_reuse::{self, *};

use super::BlobStore;
use crate::blobstore;
use crate::fixtures::{BLOB_A, BLOB_B};

mod utils;
use self::utils::make_local_fs_blob_store;

/// This produces a template, which will be applied to all individual test functions.
/// See https://github.com/la10736/rstest/issues/130#issuecomment-968864832
#[template]
#[rstest]
#[case::memory(blobstore::from_addr("memory://").await.unwrap())]
#[case::objectstore_memory(blobstore::from_addr("objectstore+memory:///").await.unwrap())]
#[case::objectstore_local_fs(make_local_fs_blob_store().await)]
pub fn blob_stores(#[case] blob_store: impl BlobStore) {}

/// Using [BlobStore::has] on a non-existing key should return false.
#[apply(blob_stores)]
#[tokio::test]
async fn has_nonexistent_false(blob_store: impl BlobStore) {
    assert!(!blob_store.has("335afcab").await.expect("must not fail"));
}

/// Trying to get a non-existing key should return None.
#[apply(blob_stores)]
#[tokio::test]
async fn get_nonexistent_none(blob_store: impl BlobStore) {
    assert!(blob_store
        .get("335afcab")
        .await
        .expect("must not fail")
        .is_none());
}

/// Deleting a non-existing key should return false.
#[apply(blob_stores)]
#[tokio::test]
async fn delete_nonexistent_false(blob_store: impl BlobStore) {
    assert!(!blob_store.delete("335afcab").await.expect("must not fail"));
}

/// An empty store lists nothing.
#[apply(blob_stores)]
#[tokio::test]
async fn list_empty(blob_store: impl BlobStore) {
    let metas: Vec<_> = blob_store.list().try_collect().await.expect("must succeed");
    assert!(metas.is_empty());
}

/// Put blobs in the store, check has, get them back, delete them.
#[apply(blob_stores)]
#[tokio::test]
async fn put_has_get_delete(blob_store: impl BlobStore) {
    for (key, contents) in [("0000000a", &*BLOB_A), ("0000000b", &*BLOB_B)] {
        blob_store
            .put(key, contents.clone())
            .await
            .expect("put must succeed");

        assert!(
            blob_store.has(key).await.expect("must not fail"),
            "blob store should now have the blob"
        );

        let data = blob_store
            .get(key)
            .await
            .expect("get must succeed")
            .expect("must be some");
        assert_eq!(contents, &data, "read blob contents must match");

        assert!(blob_store.delete(key).await.expect("must not fail"));
        assert!(!blob_store.has(key).await.expect("must not fail"));
        assert!(
            !blob_store.delete(key).await.expect("must not fail"),
            "second delete must report nothing was deleted"
        );
    }
}

/// Putting the same key twice replaces the contents.
#[apply(blob_stores)]
#[tokio::test]
async fn put_overwrites(blob_store: impl BlobStore) {
    blob_store
        .put("0000000a", BLOB_A.clone())
        .await
        .expect("must succeed");
    blob_store
        .put("0000000a", BLOB_B.clone())
        .await
        .expect("must succeed");

    let data = blob_store
        .get("0000000a")
        .await
        .expect("must succeed")
        .expect("must be some");
    assert_eq!(*BLOB_B, data);
}

/// Empty blobs are valid blobs.
#[apply(blob_stores)]
#[tokio::test]
async fn put_get_empty(blob_store: impl BlobStore) {
    blob_store
        .put("00000000", bytes::Bytes::new())
        .await
        .expect("must succeed");

    assert!(blob_store.has("00000000").await.expect("must succeed"));
    let data = blob_store
        .get("00000000")
        .await
        .expect("must succeed")
        .expect("must be some");
    assert!(data.is_empty());
}

/// Listing returns every stored key with its size and a plausible mtime.
#[apply(blob_stores)]
#[tokio::test]
async fn list_contents(blob_store: impl BlobStore) {
    let before = SystemTime::now() - Duration::from_secs(60);

    blob_store
        .put("0000000a", BLOB_A.clone())
        .await
        .expect("must succeed");
    blob_store
        .put("0000000b", BLOB_B.clone())
        .await
        .expect("must succeed");

    let mut metas: Vec<_> = blob_store.list().try_collect().await.expect("must succeed");
    metas.sort_by(|a, b| a.key.cmp(&b.key));

    assert_eq!(
        vec![
            ("0000000a", BLOB_A.len() as u64),
            ("0000000b", BLOB_B.len() as u64)
        ],
        metas
            .iter()
            .map(|m| (m.key.as_str(), m.size))
            .collect::<Vec<_>>()
    );

    for meta in metas {
        assert!(meta.last_modified > before, "mtime must be recent");
    }
}
