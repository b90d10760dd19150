//! Storage contracts
//!
//! The records core consumes two stores:
//!
//! - [`MessageStore`]: accepted messages plus the index fields queries filter on
//! - [`DataStore`]: content-addressed payload bytes, keyed by `dataCid`
//!
//! Both are partitioned by tenant. Implementations backed by sled and by the
//! local filesystem live in the submodules.

pub mod data_store_fs;
pub mod message_store_sled;

use crate::error::Result;
use crate::records::types::RecordsWriteMessage;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub use data_store_fs::FsDataStore;
pub use message_store_sled::SledMessageStore;

/// A single indexed field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexValue {
    Bool(bool),
    Number(u64),
    String(String),
}

impl IndexValue {
    /// Ordering between values of the same kind; `None` across kinds.
    fn compare(&self, other: &IndexValue) -> Option<Ordering> {
        match (self, other) {
            (IndexValue::Bool(a), IndexValue::Bool(b)) => Some(a.cmp(b)),
            (IndexValue::Number(a), IndexValue::Number(b)) => Some(a.cmp(b)),
            (IndexValue::String(a), IndexValue::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            _ => None,
        }
    }
}

impl From<&str> for IndexValue {
    fn from(value: &str) -> Self {
        IndexValue::String(value.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(value: String) -> Self {
        IndexValue::String(value)
    }
}

impl From<bool> for IndexValue {
    fn from(value: bool) -> Self {
        IndexValue::Bool(value)
    }
}

impl From<u64> for IndexValue {
    fn from(value: u64) -> Self {
        IndexValue::Number(value)
    }
}

/// Index fields of a stored message
pub type Indexes = BTreeMap<String, IndexValue>;

/// Range constraint; absent bounds are unconstrained
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<IndexValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<IndexValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<IndexValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<IndexValue>,
}

impl RangeFilter {
    fn matches(&self, value: &IndexValue) -> bool {
        let check = |bound: &Option<IndexValue>, accept: fn(Ordering) -> bool| match bound {
            Some(bound) => value.compare(bound).is_some_and(accept),
            None => true,
        };
        check(&self.gt, Ordering::is_gt)
            && check(&self.gte, Ordering::is_ge)
            && check(&self.lt, Ordering::is_lt)
            && check(&self.lte, Ordering::is_le)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterValue {
    Equal(IndexValue),
    Range(RangeFilter),
}

/// Conjunction of per-field constraints over [`Indexes`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    fields: BTreeMap<String, FilterValue>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) an exact-match constraint
    pub fn equal(mut self, field: impl Into<String>, value: impl Into<IndexValue>) -> Self {
        self.fields
            .insert(field.into(), FilterValue::Equal(value.into()));
        self
    }

    /// Adds (or replaces) a range constraint
    pub fn range(mut self, field: impl Into<String>, range: RangeFilter) -> Self {
        self.fields.insert(field.into(), FilterValue::Range(range));
        self
    }

    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when every constraint is satisfied. A missing index never matches.
    pub fn matches(&self, indexes: &Indexes) -> bool {
        self.fields.iter().all(|(field, constraint)| {
            let Some(value) = indexes.get(field) else {
                return false;
            };
            match constraint {
                FilterValue::Equal(expected) => value == expected,
                FilterValue::Range(range) => range.matches(value),
            }
        })
    }
}

/// Message index store
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Stores `message` under its CID, replacing any row already there
    async fn put(&self, tenant: &str, message: &RecordsWriteMessage, indexes: Indexes) -> Result<()>;

    /// Fetches a message by its CID
    async fn get(&self, tenant: &str, cid: &str) -> Result<Option<RecordsWriteMessage>>;

    /// Messages matching `filter`, in store-native order
    async fn query(&self, tenant: &str, filter: &Filter) -> Result<Vec<RecordsWriteMessage>>;

    async fn delete(&self, tenant: &str, cid: &str) -> Result<()>;

    /// Removes everything, across all tenants
    async fn clear(&self) -> Result<()>;
}

/// Result of storing a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResult {
    pub data_cid: String,
    pub data_size: u64,
    /// The payload was already held and nothing was written
    pub already_existed: bool,
}

/// Content-addressed payload store
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn put(&self, tenant: &str, record_id: &str, data: Bytes) -> Result<PutResult>;

    async fn get(&self, tenant: &str, record_id: &str, data_cid: &str) -> Result<Option<Bytes>>;

    async fn has(&self, tenant: &str, record_id: &str, data_cid: &str) -> Result<bool>;

    async fn delete(&self, tenant: &str, record_id: &str, data_cid: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}
