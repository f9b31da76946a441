//! Process-local correlation store.
//!
//! Holds records in a map for the lifetime of the value. The service binary
//! always uses [`SqliteStore`](super::SqliteStore); this one backs tests.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex};

use super::{CorrelationStore, PutOutcome, StoreError};
use crate::types::{CorrelationKey, TicketId};

/// In-memory [`CorrelationStore`]. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<CorrelationKey, TicketId>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_records<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut HashMap<CorrelationKey, TicketId>) -> T,
    ) -> Result<T, StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::unavailable(operation, "lock poisoned"))?;
        Ok(f(&mut records))
    }
}

impl CorrelationStore for MemoryStore {
    async fn get(&self, key: &CorrelationKey) -> Result<Option<TicketId>, StoreError> {
        self.with_records("get", |records| records.get(key).copied())
    }

    async fn put(&self, key: &CorrelationKey, ticket: TicketId) -> Result<PutOutcome, StoreError> {
        self.with_records("put", |records| match records.entry(key.clone()) {
            Entry::Occupied(existing) => PutOutcome::Existing(*existing.get()),
            Entry::Vacant(slot) => {
                slot.insert(ticket);
                PutOutcome::Inserted
            }
        })
    }
}
