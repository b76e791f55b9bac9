mod errors;

pub mod blobstore;
pub mod client;
pub mod fixtures;
pub mod handle;
pub mod imageservice;
pub mod proto;
pub mod retention;
pub mod smoke;
pub mod tls;
pub mod tonic;
pub mod utils;

pub use errors::Error;
pub use handle::{Handle, Tier};

// Needed for the #[template]/#[apply] test suites.
#[cfg(test)]
use rstest_reuse;
