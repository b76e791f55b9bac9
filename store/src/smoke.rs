//! End-to-end check of a running ImageStore: read, store, read back, remove.

use bytes::Bytes;
use tracing::{info, instrument, warn};

use crate::client::{Error, ImageStoreClient};

/// Handle read at the start, it usually doesn't exist.
pub const CANARY_HANDLE: &str = "inmem_335afcab";

/// Payload stored (and removed again) in the in-memory tier.
pub const SMOKE_PAYLOAD: &[u8] = b"imagestore smoke test";

/// What a successful [run] stored.
#[derive(Debug, PartialEq, Eq)]
pub struct Report {
    /// Handle of [SMOKE_PAYLOAD], already removed again.
    pub handle: String,

    /// Handle and read back contents of the extra input, if any.
    pub input: Option<(String, Bytes)>,
}

/// Stores `payload` and checks it reads back unchanged.
async fn store_and_compare(
    client: &ImageStoreClient,
    payload: Bytes,
    tier: &str,
) -> Result<(String, Bytes), Error> {
    let handle = client.store(payload.clone(), tier).await?;
    let data = client.read(&handle).await?;

    if data != payload {
        return Err(Error::ContentMismatch(handle));
    }

    Ok((handle, data))
}

/// Runs the smoke test sequence against `client`.
///
/// A failing read of [CANARY_HANDLE] is only logged. [SMOKE_PAYLOAD] is then
/// stored in the in-memory tier, read back and removed. If `input` is given,
/// it's stored in the given tier and read back too, but not removed.
#[instrument(skip_all, err)]
pub async fn run(
    client: &ImageStoreClient,
    input: Option<(Bytes, &str)>,
) -> Result<Report, Error> {
    match client.read(CANARY_HANDLE).await {
        Ok(data) => info!(handle = CANARY_HANDLE, blob.size = data.len(), "canary read"),
        Err(e) => warn!(handle = CANARY_HANDLE, err = %e, "canary read failed"),
    }

    let (handle, _) =
        store_and_compare(client, Bytes::from_static(SMOKE_PAYLOAD), "inmemory").await?;
    client.remove(&handle).await?;

    let input = match input {
        Some((payload, tier)) => Some(store_and_compare(client, payload, tier).await?),
        None => None,
    };

    info!("smoke test passed");
    Ok(Report { handle, input })
}
