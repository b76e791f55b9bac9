use lazy_static::lazy_static;

use crate::proto::CHUNK_SIZE;

pub const HELLOWORLD_BLOB_CONTENTS: &[u8] = b"Hello World!";

lazy_static! {
    // 2 bytes
    pub static ref BLOB_A: bytes::Bytes = vec![0x00, 0x01].into();

    // 1MB
    pub static ref BLOB_B: bytes::Bytes = (0..255).collect::<Vec<u8>>().repeat(4 * 1024).into();

    // Two full chunks and a bit, so it's sent as three messages.
    pub static ref BLOB_C: bytes::Bytes = (0..=255u8)
        .cycle()
        .take(2 * CHUNK_SIZE + 1234)
        .collect::<Vec<u8>>()
        .into();
}
