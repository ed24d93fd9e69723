use thiserror::Error;

/// Failures surfaced by the [`crate::Store`]/[`crate::Transaction`] pair.
/// `SerializationFailure` is the one sentinel `with_serializable_retry`
/// catches and retries; everything else propagates to the caller as an
/// internal error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("serialization failure, transaction must be retried")]
    SerializationFailure,

    #[error("storage backend error: {0}")]
    Backend(String),
}
