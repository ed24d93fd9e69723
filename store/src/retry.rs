use std::future::Future;

use domain::ErrorKind;

use crate::error::StoreError;
use crate::traits::{Store, Transaction};

/// Maximum number of times a transaction is restarted after observing the
/// serialization-failure sentinel, before giving up with [`ErrorKind::Conflict`].
pub const MAX_RETRIES: u32 = 3;

/// What one attempt of a transactional step produced.
pub enum StepOutcome<T> {
    /// The transaction has already been committed or rolled back by the
    /// step; this is the final result for the whole call.
    Done(Result<T, ErrorKind>),
    /// The step observed a serialization conflict, already rolled its
    /// transaction back, and should be retried from scratch.
    Retry,
}

/// Runs `step` inside a fresh serializable transaction, retrying on the
/// store's serialization-failure sentinel only, up to [`MAX_RETRIES`]
/// times. `step` owns its transaction end-to-end: it is responsible for
/// committing or rolling back before returning.
pub async fn with_serializable_retry<S, T, F, Fut>(store: &S, mut step: F) -> Result<T, ErrorKind>
where
    S: Store,
    F: FnMut(S::Tx) -> Fut,
    Fut: Future<Output = StepOutcome<T>>,
{
    let mut attempt = 0u32;
    loop {
        let tx = store
            .begin_serializable()
            .await
            .map_err(store_error_to_kind)?;

        match step(tx).await {
            StepOutcome::Done(result) => return result,
            StepOutcome::Retry => {
                attempt += 1;
                tracing::warn!(attempt, "serialization conflict, retrying transaction");
                if attempt >= MAX_RETRIES {
                    return Err(ErrorKind::Conflict);
                }
            }
        }
    }
}

/// Classifies a raw store error into the retry signal the step closures
/// use: the serialization sentinel maps to a retry, everything else is an
/// internal failure that aborts immediately (mirrors the cowprotocol
/// settlement observer's retry_with_sleep, minus the sleep: this core has
/// no temporary-error class to wait out, only the conflict sentinel).
pub fn store_error_to_kind(err: StoreError) -> ErrorKind {
    match err {
        StoreError::SerializationFailure => ErrorKind::Conflict,
        StoreError::Backend(msg) => {
            tracing::error!(error = %msg, "store backend error");
            ErrorKind::Internal(msg)
        }
    }
}

/// Rolls `tx` back and classifies the error that caused it: the
/// serialization sentinel becomes a retry signal, anything else becomes a
/// final `Done(Err(..))`. Used by every step function's fallible-call
/// sites so the propagation policy (§7: no retry except on the sentinel)
/// lives in one place.
pub async fn rollback_and_classify<Tx, T>(tx: Tx, err: StoreError) -> StepOutcome<T>
where
    Tx: Transaction,
{
    let should_retry = matches!(err, StoreError::SerializationFailure);
    let _ = tx.rollback().await;
    if should_retry {
        StepOutcome::Retry
    } else {
        StepOutcome::Done(Err(store_error_to_kind(err)))
    }
}

/// Commits `tx` and wraps the result as a [`StepOutcome`]: the sentinel
/// becomes a retry, any other commit failure becomes `Done(Err(..))`, and
/// success carries `value` through as the call's final result.
pub async fn commit_or_retry<Tx, T>(tx: Tx, value: T) -> StepOutcome<T>
where
    Tx: Transaction,
{
    match tx.commit().await {
        Ok(()) => StepOutcome::Done(Ok(value)),
        Err(StoreError::SerializationFailure) => StepOutcome::Retry,
        Err(e) => StepOutcome::Done(Err(store_error_to_kind(e))),
    }
}
