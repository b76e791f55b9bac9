//! This contains test scenarios that a given [ImageService] needs to pass.
//! Every scenario runs against the tiered service directly, and against the
//! same service exposed over gRPC.

use bytes::Bytes;
use rstest::*;
use rstest_reuse::{self, *};

use super::ImageService;
use crate::fixtures::{BLOB_A, BLOB_B, BLOB_C, HELLOWORLD_BLOB_CONTENTS};
use crate::{Handle, Tier};

mod utils;
use self::utils::{make_grpc_image_service, make_tiered_image_service};

#[template]
#[rstest]
#[case::tiered(make_tiered_image_service().await)]
#[case::grpc(make_grpc_image_service().await)]
pub fn image_services(#[case] image_service: impl ImageService) {}

/// Reading an unknown handle returns None, in every tier.
#[apply(image_services)]
#[tokio::test]
async fn read_unknown_none(image_service: impl ImageService) {
    for handle in ["inmem_335afcab", "persist_335afcab"] {
        let handle: Handle = handle.parse().unwrap();
        assert!(image_service
            .read(&handle)
            .await
            .expect("must not fail")
            .is_none());
    }
}

/// Removing an unknown handle returns false.
#[apply(image_services)]
#[tokio::test]
async fn remove_unknown_false(image_service: impl ImageService) {
    let handle: Handle = "inmem_335afcab".parse().unwrap();
    assert!(!image_service.remove(&handle).await.expect("must not fail"));
}

/// Store a blob in each tier, read it back, remove it, and make sure it's gone.
#[apply(image_services)]
#[tokio::test]
async fn store_read_remove(image_service: impl ImageService) {
    for tier in Tier::ALL {
        for contents in [&*BLOB_A, &*BLOB_B] {
            let handle = image_service
                .store(tier, contents.clone())
                .await
                .expect("store must succeed");
            assert_eq!(tier, handle.tier(), "handle must carry the requested tier");

            let data = image_service
                .read(&handle)
                .await
                .expect("read must succeed")
                .expect("must be some");
            assert_eq!(contents, &data, "read blob contents must match");

            assert!(image_service.remove(&handle).await.expect("must succeed"));
            assert!(image_service
                .read(&handle)
                .await
                .expect("must succeed")
                .is_none());
            assert!(!image_service.remove(&handle).await.expect("must succeed"));
        }
    }
}

/// An empty payload is a valid blob, and reads back empty.
#[apply(image_services)]
#[tokio::test]
async fn store_empty(image_service: impl ImageService) {
    let handle = image_service
        .store(Tier::InMemory, Bytes::new())
        .await
        .expect("store must succeed");

    let data = image_service
        .read(&handle)
        .await
        .expect("must succeed")
        .expect("must be some");
    assert!(data.is_empty());
}

/// A blob larger than a single chunk survives the round trip.
#[apply(image_services)]
#[tokio::test]
async fn store_multi_chunk(image_service: impl ImageService) {
    let handle = image_service
        .store(Tier::Persistent, BLOB_C.clone())
        .await
        .expect("store must succeed");

    let data = image_service
        .read(&handle)
        .await
        .expect("must succeed")
        .expect("must be some");
    assert_eq!(BLOB_C.len(), data.len());
    assert_eq!(*BLOB_C, data);
}

/// Storing the same payload twice yields two independent handles.
#[apply(image_services)]
#[tokio::test]
async fn store_twice_distinct_handles(image_service: impl ImageService) {
    let payload = Bytes::from_static(HELLOWORLD_BLOB_CONTENTS);

    let h1 = image_service
        .store(Tier::InMemory, payload.clone())
        .await
        .expect("must succeed");
    let h2 = image_service
        .store(Tier::InMemory, payload.clone())
        .await
        .expect("must succeed");
    assert_ne!(h1, h2);

    // removing one keeps the other.
    assert!(image_service.remove(&h1).await.expect("must succeed"));
    assert_eq!(
        Some(payload),
        image_service.read(&h2).await.expect("must succeed")
    );
}

/// Tiers are separate namespaces: a handle's key in one tier is unknown in
/// the other.
#[apply(image_services)]
#[tokio::test]
async fn tiers_are_separate(image_service: impl ImageService) {
    let handle = image_service
        .store(Tier::InMemory, BLOB_A.clone())
        .await
        .expect("must succeed");

    let other: Handle = format!("{}_{}", Tier::Persistent.prefix(), handle.key())
        .parse()
        .unwrap();

    assert!(image_service
        .read(&other)
        .await
        .expect("must succeed")
        .is_none());
}
