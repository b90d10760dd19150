//! Latest-state maintenance for a record
//!
//! At most one stored message per record carries `isLatestBaseState = true`.
//! Once a newer write is accepted, everything older is removed, except the
//! initial write: it stays, demoted, because record and context ids are
//! recomputed from it when later writes arrive.

use crate::error::Result;
use crate::message::DwnMessage;
use crate::records::indexes::construct_records_write_indexes;
use crate::records::types::RecordsWriteMessage;
use crate::records::write::RecordsWrite;
use crate::store::MessageStore;
use tracing::{debug, info};

/// Deletes every message in `existing` older than `newest`. The initial
/// write is overwritten in place with `isLatestBaseState = false` instead.
///
/// Normally there are at most two existing messages per record, but a crash
/// between storing a write and reconciling can leave more behind; all of them
/// are cleaned up here.
pub async fn reconcile(
    tenant: &str,
    existing: &[RecordsWriteMessage],
    newest: &RecordsWriteMessage,
    message_store: &dyn MessageStore,
) -> Result<()> {
    for message in existing {
        if !RecordsWrite::is_older(message, newest)? {
            continue;
        }

        let cid = message.cid()?;

        if RecordsWrite::is_initial_write_message(message)? {
            // put replaces the row under the same CID, so the anchor is never absent
            let initial_write = RecordsWrite::parse(message.clone())?;
            let indexes = construct_records_write_indexes(&initial_write, false)?;
            message_store.put(tenant, message, indexes).await?;
            debug!(tenant = %tenant, cid = %cid, record_id = %message.record_id, "Demoted initial write");
        } else {
            message_store.delete(tenant, &cid).await?;
            info!(tenant = %tenant, cid = %cid, record_id = %message.record_id, "Pruned superseded write");
        }
    }
    Ok(())
}
