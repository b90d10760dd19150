//! RecordsWrite handler
//!
//! Accepts a write when it is the newest version of its record, stores its
//! payload and reconciles the record's older versions.

use super::{MessageReply, RecordLocks};
use crate::auth::authenticate;
use crate::did::DidResolver;
use crate::error::{DwnError, Result};
use crate::hashing::compute_data_cid;
use crate::message::DwnMessage;
use crate::protocols::ProtocolAuthorizer;
use crate::records::indexes::{construct_records_write_indexes, fields};
use crate::records::types::RecordsWriteMessage;
use crate::records::versioning::reconcile;
use crate::records::write::RecordsWrite;
use crate::store::{DataStore, Filter, MessageStore};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct RecordsWriteHandler {
    did_resolver: Arc<dyn DidResolver>,
    message_store: Arc<dyn MessageStore>,
    data_store: Arc<dyn DataStore>,
    protocols: Arc<dyn ProtocolAuthorizer>,
    locks: Arc<RecordLocks>,
}

impl RecordsWriteHandler {
    pub fn new(
        did_resolver: Arc<dyn DidResolver>,
        message_store: Arc<dyn MessageStore>,
        data_store: Arc<dyn DataStore>,
        protocols: Arc<dyn ProtocolAuthorizer>,
        locks: Arc<RecordLocks>,
    ) -> Self {
        Self {
            did_resolver,
            message_store,
            data_store,
            protocols,
            locks,
        }
    }

    /// Processes a write for `tenant`, with its payload when supplied.
    pub async fn handle(
        &self,
        tenant: &str,
        message: RecordsWriteMessage,
        data: Option<Bytes>,
    ) -> MessageReply {
        let write = match RecordsWrite::parse(message) {
            Ok(write) => write,
            Err(e) => {
                debug!(tenant = %tenant, error = %e, "Rejected malformed RecordsWrite");
                return MessageReply::new(400, e.to_string());
            }
        };

        let authorized = async {
            authenticate(&write.message().authorization, self.did_resolver.as_ref()).await?;
            write
                .authorize(tenant, self.message_store.as_ref(), self.protocols.as_ref())
                .await
        };
        if let Err(e) = authorized.await {
            info!(tenant = %tenant, record_id = %write.record_id(), error = %e, "Unauthorized RecordsWrite");
            return MessageReply::new(401, e.to_string());
        }

        let record_id = write.record_id().to_string();
        let guard = self.locks.lock(tenant, &record_id).await;
        let result = self.store_if_newest(tenant, &write, data).await;
        drop(guard);

        match result {
            Ok(reply) => {
                info!(tenant = %tenant, record_id = %record_id, code = reply.code(), "Processed RecordsWrite");
                reply
            }
            Err(e) => {
                if e.is_store_failure() {
                    warn!(tenant = %tenant, record_id = %record_id, error = %e, "RecordsWrite store failure");
                }
                MessageReply::from(e)
            }
        }
    }

    async fn store_if_newest(
        &self,
        tenant: &str,
        write: &RecordsWrite,
        data: Option<Bytes>,
    ) -> Result<MessageReply> {
        let incoming = write.message();
        let existing = self
            .message_store
            .query(
                tenant,
                &Filter::new().equal(fields::RECORD_ID, write.record_id()),
            )
            .await?;

        if !write.is_initial_write() {
            let initial_write = RecordsWrite::initial_write(&existing)?;
            RecordsWrite::verify_equality_of_immutable_properties(initial_write, incoming)?;
        }

        let incoming_cid = incoming.cid()?;
        let newest = match RecordsWrite::newest_message(existing.iter().chain([incoming]))? {
            Some(newest) => newest,
            None => incoming,
        };

        let reply = if newest.cid()? == incoming_cid {
            self.store_data(tenant, write, &existing, data).await?;
            let indexes = construct_records_write_indexes(write, true)?;
            self.message_store.put(tenant, incoming, indexes).await?;
            MessageReply::new(202, "Accepted")
        } else {
            debug!(tenant = %tenant, cid = %incoming_cid, "A newer version of the record exists");
            MessageReply::new(409, "Conflict")
        };

        reconcile(tenant, &existing, newest, self.message_store.as_ref()).await?;
        Ok(reply)
    }

    /// Stores the payload, or checks that the referenced payload is already
    /// held when none is supplied.
    async fn store_data(
        &self,
        tenant: &str,
        write: &RecordsWrite,
        existing: &[RecordsWriteMessage],
        data: Option<Bytes>,
    ) -> Result<()> {
        let descriptor = &write.message().descriptor;

        let Some(data) = data else {
            let referenced = existing
                .iter()
                .any(|m| m.descriptor.data_cid == descriptor.data_cid);
            if referenced
                || self
                    .data_store
                    .has(tenant, write.record_id(), &descriptor.data_cid)
                    .await?
            {
                return Ok(());
            }
            return Err(DwnError::MalformedMessage(format!(
                "data for {} is neither supplied nor already stored",
                descriptor.data_cid
            )));
        };

        // checked before anything is written: the payload file is shared by
        // every record of the tenant holding the same bytes
        let data_cid = compute_data_cid(&data);
        let data_size = data.len() as u64;
        if data_cid != descriptor.data_cid || data_size != descriptor.data_size {
            return Err(DwnError::DataMismatch(format!(
                "actual data CID {data_cid} and size {data_size} do not match dataCid {} and dataSize {} in descriptor",
                descriptor.data_cid, descriptor.data_size
            )));
        }

        let stored = self.data_store.put(tenant, write.record_id(), data).await?;
        if stored.already_existed {
            debug!(tenant = %tenant, data_cid = %stored.data_cid, "Payload already held");
        }
        Ok(())
    }
}
