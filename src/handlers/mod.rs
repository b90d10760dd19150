//! Method handlers and the reply envelope they produce

pub mod records_query;
pub mod records_write;

use crate::error::DwnError;
use crate::records::types::QueryResultEntry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub use records_query::RecordsQueryHandler;
pub use records_write::RecordsWriteHandler;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: u16,
    pub detail: String,
}

/// Reply to a processed message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReply {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<QueryResultEntry>>,
}

impl MessageReply {
    pub fn new(code: u16, detail: impl Into<String>) -> Self {
        Self {
            status: Status {
                code,
                detail: detail.into(),
            },
            entries: None,
        }
    }

    pub fn with_entries(entries: Vec<QueryResultEntry>) -> Self {
        Self {
            status: Status {
                code: 200,
                detail: "OK".to_string(),
            },
            entries: Some(entries),
        }
    }

    pub fn code(&self) -> u16 {
        self.status.code
    }
}

impl From<DwnError> for MessageReply {
    fn from(err: DwnError) -> Self {
        MessageReply::new(err.status_code(), err.to_string())
    }
}

/// Serializes processing of writes to the same record.
///
/// Reconciliation reads the record's messages and then rewrites them; two
/// writes racing through it could both end up latest.
#[derive(Default)]
pub struct RecordLocks {
    locks: DashMap<(String, String), Arc<Mutex<()>>>,
}

/// Exclusive access to one record.
///
/// Dropping it, or dropping the future still waiting for it, removes the
/// table entry once nobody else holds or waits on the record.
pub struct RecordLockGuard<'a> {
    locks: &'a RecordLocks,
    key: (String, String),
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RecordLockGuard<'_> {
    fn drop(&mut self) {
        // the mutex Arc must be gone before counting holders
        self.guard.take();
        self.locks
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `(tenant, record_id)`
    pub async fn lock(&self, tenant: &str, record_id: &str) -> RecordLockGuard<'_> {
        let key = (tenant.to_string(), record_id.to_string());
        let mutex = self.locks.entry(key.clone()).or_default().clone();

        let mut held = RecordLockGuard {
            locks: self,
            key,
            guard: None,
        };
        held.guard = Some(mutex.lock_owned().await);
        held
    }

    /// Number of records with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
