//! Records message shapes
//!
//! Optional fields are `Option` and skipped when absent, so a descriptor's
//! canonical hash only covers the fields that were actually supplied.

use crate::jws::GeneralJws;
use crate::message::{DwnMessage, Interface, Method};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsWriteDescriptor {
    pub interface: Interface,
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub data_cid: String,
    pub data_size: u64,
    pub date_created: String,
    pub date_modified: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    pub data_format: String,
}

impl RecordsWriteDescriptor {
    pub fn is_published(&self) -> bool {
        self.published.unwrap_or(false)
    }
}

/// A signed RecordsWrite message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsWriteMessage {
    pub record_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    pub descriptor: RecordsWriteDescriptor,
    pub authorization: GeneralJws,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<GeneralJws>,
}

/// A RecordsWrite without its authorization.
///
/// Used as the base for follow-up writes and as a query result entry, where
/// signature material is stripped before replying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedRecordsWriteMessage {
    pub record_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    pub descriptor: RecordsWriteDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<GeneralJws>,
}

pub type QueryResultEntry = UnsignedRecordsWriteMessage;

impl From<RecordsWriteMessage> for UnsignedRecordsWriteMessage {
    fn from(message: RecordsWriteMessage) -> Self {
        Self {
            record_id: message.record_id,
            context_id: message.context_id,
            descriptor: message.descriptor,
            attestation: message.attestation,
        }
    }
}

impl From<&RecordsWriteMessage> for UnsignedRecordsWriteMessage {
    fn from(message: &RecordsWriteMessage) -> Self {
        message.clone().into()
    }
}

impl DwnMessage for RecordsWriteMessage {
    type Descriptor = RecordsWriteDescriptor;

    fn descriptor(&self) -> &RecordsWriteDescriptor {
        &self.descriptor
    }

    fn authorization(&self) -> &GeneralJws {
        &self.authorization
    }

    fn interface(&self) -> Interface {
        self.descriptor.interface
    }

    fn method(&self) -> Method {
        self.descriptor.method
    }
}

/// Payload signed by the author of a RecordsWrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsWriteAuthorizationPayload {
    pub record_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    pub descriptor_cid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation_cid: Option<String>,
}

/// Payload signed by an attester, and by the author of messages that carry no
/// extra authorization fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorCidPayload {
    pub descriptor_cid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateSort {
    CreatedAscending,
    CreatedDescending,
    PublishedAscending,
    PublishedDescending,
}

/// `dateCreated` range filter; `from` is inclusive, `to` exclusive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsQueryFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsQueryDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub date_created: String,
    pub filter: RecordsQueryFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_sort: Option<DateSort>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordsQueryMessage {
    pub descriptor: RecordsQueryDescriptor,
    pub authorization: GeneralJws,
}

impl DwnMessage for RecordsQueryMessage {
    type Descriptor = RecordsQueryDescriptor;

    fn descriptor(&self) -> &RecordsQueryDescriptor {
        &self.descriptor
    }

    fn authorization(&self) -> &GeneralJws {
        &self.authorization
    }

    fn interface(&self) -> Interface {
        self.descriptor.interface
    }

    fn method(&self) -> Method {
        self.descriptor.method
    }
}
