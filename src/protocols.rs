//! Protocol-governed authorization
//!
//! Writes that declare a `protocol` are authorized by that protocol's
//! role/action rules instead of plain tenant ownership. The rule engine lives
//! outside this crate and plugs in through [`ProtocolAuthorizer`].

use crate::error::{DwnError, Result};
use crate::records::write::RecordsWrite;
use crate::store::MessageStore;
use async_trait::async_trait;

/// Evaluates a protocol's rules for a write
#[async_trait]
pub trait ProtocolAuthorizer: Send + Sync {
    /// Succeeds when the write's author may perform it under the protocol
    /// named in its descriptor, given the record's existing context.
    async fn authorize(
        &self,
        tenant: &str,
        write: &RecordsWrite,
        message_store: &dyn MessageStore,
    ) -> Result<()>;
}

/// Authorizer for a node with no protocol definitions installed.
///
/// Every protocol-governed write is rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProtocolRules;

#[async_trait]
impl ProtocolAuthorizer for NoProtocolRules {
    async fn authorize(
        &self,
        _tenant: &str,
        write: &RecordsWrite,
        _message_store: &dyn MessageStore,
    ) -> Result<()> {
        let protocol = write.message().descriptor.protocol.as_deref().unwrap_or_default();
        Err(DwnError::NotAuthorized(format!(
            "no rules installed for protocol {protocol}"
        )))
    }
}
