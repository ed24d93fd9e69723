pub mod error;
pub mod retry;
pub mod traits;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use error::StoreError;
pub use retry::{
    commit_or_retry, rollback_and_classify, store_error_to_kind, with_serializable_retry,
    StepOutcome, MAX_RETRIES,
};
pub use traits::{Store, Transaction};

#[cfg(feature = "memory")]
pub use memory::MemoryStore;

#[cfg(feature = "postgres")]
pub use postgres::{PgStore, PgTx};
