//! Correlation store: issue → ticket mapping.
//!
//! One record per tracked issue, written when the issue is opened and read for
//! every later event on it. Records are never deleted by the bridge.
//!
//! Writes are insert-if-absent. Two invocations racing on the same "opened"
//! event cannot overwrite each other's record; the loser learns which ticket
//! won via [`PutOutcome::Existing`].

use std::future::Future;

use thiserror::Error;

use crate::error::ErrorKind;
use crate::types::{CorrelationKey, TicketId};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Errors from a correlation store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or the operation failed.
    #[error("correlation store unavailable during {operation}: {message}")]
    Unavailable {
        operation: &'static str,
        message: String,
    },

    /// A stored ticket ID could not be parsed back.
    #[error("stored ticket id {value:?} for {key} is not a number")]
    InvalidRecord { key: CorrelationKey, value: String },
}

impl StoreError {
    pub fn unavailable(operation: &'static str, message: impl ToString) -> Self {
        StoreError::Unavailable {
            operation,
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::StoreUnavailable
    }
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The record was written.
    Inserted,
    /// A record already existed and was left untouched.
    Existing(TicketId),
}

/// Keyed store of correlation records.
///
/// # Example (in-memory for testing)
///
/// ```
/// use ticket_bridge::store::{CorrelationStore, MemoryStore, PutOutcome};
/// use ticket_bridge::types::{CorrelationKey, TicketId};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MemoryStore::new();
/// let key = CorrelationKey::new("o/r", 1);
///
/// assert_eq!(store.put(&key, TicketId(7)).await.unwrap(), PutOutcome::Inserted);
/// assert_eq!(store.get(&key).await.unwrap(), Some(TicketId(7)));
/// # }
/// ```
pub trait CorrelationStore: Send + Sync + 'static {
    /// Looks up the ticket recorded for `key`.
    fn get(
        &self,
        key: &CorrelationKey,
    ) -> impl Future<Output = Result<Option<TicketId>, StoreError>> + Send;

    /// Records `ticket` for `key` unless a record already exists.
    fn put(
        &self,
        key: &CorrelationKey,
        ticket: TicketId,
    ) -> impl Future<Output = Result<PutOutcome, StoreError>> + Send;
}
