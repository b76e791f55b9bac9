use thiserror::Error;
use tonic::Status;

/// Errors related to communication with the store.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("blob exceeds the maximum size of {0} bytes")]
    TooLarge(usize),

    #[error("internal storage error: {0}")]
    StorageError(String),
}

impl From<Error> for Status {
    fn from(value: Error) -> Self {
        match value {
            Error::InvalidRequest(msg) => Status::invalid_argument(msg),
            e @ Error::TooLarge(_) => Status::resource_exhausted(e.to_string()),
            Error::StorageError(msg) => Status::data_loss(format!("storage error: {}", msg)),
        }
    }
}

impl From<crate::handle::Error> for Error {
    fn from(value: crate::handle::Error) -> Self {
        Self::InvalidRequest(value.to_string())
    }
}

impl From<object_store::Error> for Error {
    fn from(value: object_store::Error) -> Self {
        Self::StorageError(value.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        if value.kind() == std::io::ErrorKind::InvalidInput {
            Error::InvalidRequest(value.to_string())
        } else {
            Error::StorageError(value.to_string())
        }
    }
}
