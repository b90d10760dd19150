//! Sled-backed message store
//!
//! One sled tree per tenant, keyed by message CID. Each value is the JSON
//! encoding of the message together with its index fields; queries scan the
//! tenant's tree and evaluate the filter against the stored indexes.

use super::{Filter, Indexes, MessageStore};
use crate::error::{DwnError, Result};
use crate::message::DwnMessage;
use crate::records::types::RecordsWriteMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::path::Path;
use tracing::{debug, info};

const TENANT_TREE_PREFIX: &str = "tenant:";

/// Stored row: the message and the fields it is indexed by
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexedMessage {
    message: RecordsWriteMessage,
    indexes: Indexes,
}

pub struct SledMessageStore {
    db: Db,
}

impl SledMessageStore {
    /// Open or create the message database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Opened message store");
        Ok(Self { db })
    }

    /// In-process store that disappears on drop (for tests)
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn tenant_tree(&self, tenant: &str) -> Result<Tree> {
        Ok(self.db.open_tree(format!("{TENANT_TREE_PREFIX}{tenant}"))?)
    }

    fn decode(value: &[u8]) -> Result<IndexedMessage> {
        serde_json::from_slice(value)
            .map_err(|e| DwnError::Store(format!("Deserialization error: {}", e)))
    }

    /// Indexes stored for a message, if present
    pub fn indexes(&self, tenant: &str, cid: &str) -> Result<Option<Indexes>> {
        let tree = self.tenant_tree(tenant)?;
        match tree.get(cid.as_bytes())? {
            Some(value) => Ok(Some(Self::decode(&value)?.indexes)),
            None => Ok(None),
        }
    }

    /// Number of messages stored for a tenant
    pub fn count(&self, tenant: &str) -> Result<usize> {
        Ok(self.tenant_tree(tenant)?.len())
    }
}

#[async_trait]
impl MessageStore for SledMessageStore {
    async fn put(&self, tenant: &str, message: &RecordsWriteMessage, indexes: Indexes) -> Result<()> {
        let cid = message.cid()?;
        let row = IndexedMessage {
            message: message.clone(),
            indexes,
        };
        let value = serde_json::to_vec(&row)
            .map_err(|e| DwnError::Store(format!("Serialization error: {}", e)))?;

        self.tenant_tree(tenant)?.insert(cid.as_bytes(), value)?;
        debug!(tenant = %tenant, cid = %cid, "Stored message");
        Ok(())
    }

    async fn get(&self, tenant: &str, cid: &str) -> Result<Option<RecordsWriteMessage>> {
        let tree = self.tenant_tree(tenant)?;
        match tree.get(cid.as_bytes())? {
            Some(value) => Ok(Some(Self::decode(&value)?.message)),
            None => Ok(None),
        }
    }

    async fn query(&self, tenant: &str, filter: &Filter) -> Result<Vec<RecordsWriteMessage>> {
        let mut result = Vec::new();
        for item in self.tenant_tree(tenant)?.iter() {
            let (_, value) = item?;
            let row = Self::decode(&value)?;
            if filter.matches(&row.indexes) {
                result.push(row.message);
            }
        }
        debug!(tenant = %tenant, matched = result.len(), "Queried messages");
        Ok(result)
    }

    async fn delete(&self, tenant: &str, cid: &str) -> Result<()> {
        self.tenant_tree(tenant)?.remove(cid.as_bytes())?;
        debug!(tenant = %tenant, cid = %cid, "Deleted message");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        for name in self.db.tree_names() {
            if name.starts_with(TENANT_TREE_PREFIX.as_bytes()) {
                self.db.drop_tree(&name)?;
            }
        }
        Ok(())
    }
}
