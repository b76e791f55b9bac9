use bytes::Bytes;

mod grpc_imagestore_wrapper;

pub use grpc_imagestore_wrapper::GRPCImageStoreWrapper;

tonic::include_proto!("imagestore.v1");


/// Maximum size of the chunk carried in a single [ReadResponse] or
/// [StoreRequest].
/// This stays just below tonic's default 4 MiB message size limit, leaving
/// room for the protobuf framing and the tier label.
pub const CHUNK_SIZE: usize = 4095 * 1024;

/// Splits a payload into [CHUNK_SIZE] pieces.
/// The pieces share the payload's allocation. An empty payload yields no
/// chunks at all.
pub fn chunk_payload(payload: Bytes) -> impl Iterator<Item = Bytes> {
    let len = payload.len();
    (0..len)
        .step_by(CHUNK_SIZE)
        .map(move |start| payload.slice(start..len.min(start + CHUNK_SIZE)))
}
