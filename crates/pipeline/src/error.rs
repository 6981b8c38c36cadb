//! Pipeline error types.

/// Error from a byte-level transport operation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

/// Error from the idempotency store backend.
///
/// Backends map their native errors to a message at the crate seam, so
/// the pipeline stays independent of any particular storage stack.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct StoreError(String);

impl StoreError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Error from a lister.
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors produced while transferring a single item.
///
/// Every variant except a failed error-record write is recovered at the
/// worker: the item is recorded as failed and the run continues.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("invalid item key: {0}")]
    InvalidKey(String),

    #[error("fetch failed: {0}")]
    Fetch(#[source] TransportError),

    #[error("hash failed: {0}")]
    Hash(#[source] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("relay failed: {0}")]
    Relay(#[source] TransportError),

    #[error("cancelled")]
    Cancelled,
}
