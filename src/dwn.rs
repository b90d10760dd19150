//! Node facade
//!
//! Routes inbound messages to their method handler. All collaborators are
//! trait objects so embedders can swap stores, resolvers and protocol rules.

use crate::config::DwnConfig;
use crate::did::{DidKeyResolver, DidResolver};
use crate::error::Result;
use crate::handlers::{MessageReply, RecordLocks, RecordsQueryHandler, RecordsWriteHandler};
use crate::message::{Interface, Method};
use crate::protocols::{NoProtocolRules, ProtocolAuthorizer};
use crate::records::types::{RecordsQueryMessage, RecordsWriteMessage};
use crate::store::{DataStore, FsDataStore, MessageStore, SledMessageStore};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Just enough of a message to route it
#[derive(Deserialize)]
struct Envelope {
    descriptor: EnvelopeDescriptor,
}

#[derive(Deserialize)]
struct EnvelopeDescriptor {
    interface: Interface,
    method: Method,
}

pub struct Dwn {
    message_store: Arc<dyn MessageStore>,
    data_store: Arc<dyn DataStore>,
    records_write: RecordsWriteHandler,
    records_query: RecordsQueryHandler,
}

impl Dwn {
    pub fn new(
        did_resolver: Arc<dyn DidResolver>,
        message_store: Arc<dyn MessageStore>,
        data_store: Arc<dyn DataStore>,
        protocols: Arc<dyn ProtocolAuthorizer>,
    ) -> Self {
        let locks = Arc::new(RecordLocks::new());
        Self {
            records_write: RecordsWriteHandler::new(
                did_resolver.clone(),
                message_store.clone(),
                data_store.clone(),
                protocols,
                locks,
            ),
            records_query: RecordsQueryHandler::new(did_resolver, message_store.clone()),
            message_store,
            data_store,
        }
    }

    /// Opens a node on disk: sled message index, filesystem payloads and a
    /// caching `did:key` resolver. No protocol rules are installed.
    pub async fn open(config: &DwnConfig) -> Result<Self> {
        let message_store = SledMessageStore::open(config.message_store_path())?;
        let data_store = FsDataStore::new(config.data_store_path()).await?;
        let did_resolver = DidKeyResolver::with_config(config.did_resolver_config());

        info!(storage_dir = %config.storage_dir.display(), "Opened records node");
        Ok(Self::new(
            Arc::new(did_resolver),
            Arc::new(message_store),
            Arc::new(data_store),
            Arc::new(NoProtocolRules),
        ))
    }

    /// Processes a raw JSON message for `tenant`.
    pub async fn process_message(&self, tenant: &str, message: Value, data: Option<Bytes>) -> MessageReply {
        let envelope = match Envelope::deserialize(&message) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(tenant = %tenant, error = %e, "Unroutable message");
                return MessageReply::new(400, format!("unsupported message: {e}"));
            }
        };

        match (envelope.descriptor.interface, envelope.descriptor.method) {
            (Interface::Records, Method::Write) => match serde_json::from_value(message) {
                Ok(message) => self.process_records_write(tenant, message, data).await,
                Err(e) => MessageReply::new(400, format!("malformed RecordsWrite: {e}")),
            },
            (Interface::Records, Method::Query) => match serde_json::from_value(message) {
                Ok(message) => self.process_records_query(tenant, message).await,
                Err(e) => MessageReply::new(400, format!("malformed RecordsQuery: {e}")),
            },
        }
    }

    pub async fn process_records_write(
        &self,
        tenant: &str,
        message: RecordsWriteMessage,
        data: Option<Bytes>,
    ) -> MessageReply {
        self.records_write.handle(tenant, message, data).await
    }

    pub async fn process_records_query(&self, tenant: &str, message: RecordsQueryMessage) -> MessageReply {
        self.records_query.handle(tenant, message).await
    }

    pub fn message_store(&self) -> &Arc<dyn MessageStore> {
        &self.message_store
    }

    pub fn data_store(&self) -> &Arc<dyn DataStore> {
        &self.data_store
    }

    /// Removes all messages and payloads, across all tenants
    pub async fn clear(&self) -> Result<()> {
        self.message_store.clear().await?;
        self.data_store.clear().await
    }
}
