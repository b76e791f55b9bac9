//! Time based expiry of blobs.
//!
//! A [RetentionPolicy] periodically lists a [BlobStore] and deletes every
//! blob that was last modified longer ago than the retention time.

use std::io;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::TryStreamExt;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::blobstore::BlobStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Blobs older than this are deleted.
    pub retention: Duration,
    /// How often the store is swept.
    pub poll_interval: Duration,
}

impl RetentionPolicy {
    pub fn new(retention: Duration, poll_interval: Duration) -> Self {
        Self {
            retention,
            poll_interval,
        }
    }

    /// Whether a blob last modified at `last_modified` is expired at `now`.
    /// Blobs with a modification time in the future are kept.
    pub fn is_expired(&self, last_modified: SystemTime, now: SystemTime) -> bool {
        match now.duration_since(last_modified) {
            Ok(age) => age > self.retention,
            Err(_) => false,
        }
    }

    /// Deletes all blobs in `blob_store` that are expired at `now`.
    /// Returns the number of deleted blobs.
    #[instrument(skip_all, err)]
    pub async fn sweep(&self, blob_store: &dyn BlobStore, now: SystemTime) -> io::Result<usize> {
        // Collect first, deleting while listing isn't supported by all stores.
        let expired: Vec<String> = blob_store
            .list()
            .try_filter_map(|meta| async move {
                Ok::<_, io::Error>(
                    self.is_expired(meta.last_modified, now)
                        .then_some(meta.key),
                )
            })
            .try_collect()
            .await?;

        let mut deleted = 0;
        for key in expired {
            if blob_store.delete(&key).await? {
                debug!(key=%key, "deleted expired blob");
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    /// Sweeps `blob_store` immediately, and then every
    /// [RetentionPolicy::poll_interval]. Never returns, errors are logged
    /// and the next sweep is attempted as usual.
    pub async fn run(self, blob_store: Arc<dyn BlobStore>) {
        info!(
            retention_secs = self.retention.as_secs(),
            poll_interval_secs = self.poll_interval.as_secs(),
            "starting retention policy"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // the first tick completes immediately.
            interval.tick().await;

            match self.sweep(blob_store.as_ref(), SystemTime::now()).await {
                Ok(0) => {}
                Ok(n) => info!(deleted = n, "removed expired blobs"),
                Err(e) => warn!(err=%e, "retention sweep failed"),
            }
        }
    }
}
