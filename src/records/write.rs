//! RecordsWrite
//!
//! A write is identified by its entry id (descriptor + author). The first
//! write of a record is its *initial write*: its entry id becomes the record
//! id that every later write inherits. Later writes may change only the
//! mutable descriptor fields.

use crate::auth::{authorize_owner, validate_authorization_integrity};
use crate::error::{DwnError, Result};
use crate::hashing::{compute_cid, compute_data_cid, compute_entry_id, parse_cid};
use crate::jws::{GeneralJws, Signer};
use crate::message::{DwnMessage, Interface, Method};
use crate::protocols::ProtocolAuthorizer;
use crate::records::types::{
    DescriptorCidPayload, RecordsWriteAuthorizationPayload, RecordsWriteDescriptor,
    RecordsWriteMessage, UnsignedRecordsWriteMessage,
};
use crate::store::MessageStore;
use crate::time::{current_timestamp, parse_timestamp};
use bytes::Bytes;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};

/// Properties allowed in a write's authorization payload besides `descriptorCid`
const AUTHORIZATION_PROPERTIES: [&str; 3] = ["recordId", "contextId", "attestationCid"];

/// Descriptor fields a follow-up write may change
pub const MUTABLE_PROPERTIES: [&str; 5] = [
    "dataCid",
    "dataSize",
    "datePublished",
    "published",
    "dateModified",
];

/// Inputs for [`RecordsWrite::create`].
///
/// Exactly one of `data` and `data_cid` must be set; `data_size` accompanies
/// `data_cid`.
pub struct RecordsWriteOptions<'a> {
    pub recipient: Option<String>,
    pub protocol: Option<String>,
    pub context_id: Option<String>,
    pub schema: Option<String>,
    /// Set only for follow-up writes; the initial write derives it
    pub record_id: Option<String>,
    pub parent_id: Option<String>,
    pub data: Option<Bytes>,
    pub data_cid: Option<String>,
    pub data_size: Option<u64>,
    pub date_created: Option<String>,
    pub date_modified: Option<String>,
    pub published: Option<bool>,
    pub date_published: Option<String>,
    pub data_format: String,
    pub authorization_signer: &'a dyn Signer,
    pub attestation_signers: Vec<&'a dyn Signer>,
}

impl<'a> RecordsWriteOptions<'a> {
    pub fn new(data_format: impl Into<String>, authorization_signer: &'a dyn Signer) -> Self {
        Self {
            recipient: None,
            protocol: None,
            context_id: None,
            schema: None,
            record_id: None,
            parent_id: None,
            data: None,
            data_cid: None,
            data_size: None,
            date_created: None,
            date_modified: None,
            published: None,
            date_published: None,
            data_format: data_format.into(),
            authorization_signer,
            attestation_signers: Vec::new(),
        }
    }
}

/// Inputs for [`RecordsWrite::create_from`]
pub struct CreateFromOptions<'a> {
    /// The write this one follows
    pub base: &'a UnsignedRecordsWriteMessage,
    /// New payload; the base payload is kept when absent
    pub data: Option<Bytes>,
    pub published: Option<bool>,
    pub date_modified: Option<String>,
    pub date_published: Option<String>,
    pub authorization_signer: &'a dyn Signer,
    pub attestation_signers: Vec<&'a dyn Signer>,
}

impl<'a> CreateFromOptions<'a> {
    pub fn new(base: &'a UnsignedRecordsWriteMessage, authorization_signer: &'a dyn Signer) -> Self {
        Self {
            base,
            data: None,
            published: None,
            date_modified: None,
            date_published: None,
            authorization_signer,
            attestation_signers: Vec::new(),
        }
    }
}

/// A validated RecordsWrite message with its derived identities
#[derive(Debug, Clone)]
pub struct RecordsWrite {
    message: RecordsWriteMessage,
    author: String,
    entry_id: String,
    attesters: Vec<String>,
    authorization_payload: RecordsWriteAuthorizationPayload,
}

impl RecordsWrite {
    /// Validates an inbound message and derives its identities.
    ///
    /// Checks the authorization and attestation envelopes, then the
    /// write-specific invariants. Signatures are not verified.
    pub fn parse(message: RecordsWriteMessage) -> Result<Self> {
        let allowed: HashSet<&str> = AUTHORIZATION_PROPERTIES.into_iter().collect();
        validate_authorization_integrity(&message.descriptor, &message.authorization, &allowed)?;
        Self::validate_attestation_integrity(&message)?;
        validate_message_shape(&message)?;

        let write = Self::from_message(message)?;
        write.validate_integrity()?;
        Ok(write)
    }

    /// Builds and signs a new write.
    pub fn create(options: RecordsWriteOptions<'_>) -> Result<Self> {
        let current_time = current_timestamp();

        if options.data.is_some() == options.data_cid.is_some() {
            return Err(DwnError::AmbiguousData);
        }
        if options.data_cid.is_some() != options.data_size.is_some() {
            return Err(DwnError::InconsistentDataReference);
        }

        let (data_cid, data_size) = match (options.data_cid, options.data_size, &options.data) {
            (Some(data_cid), Some(data_size), _) => (data_cid, data_size),
            (_, _, Some(data)) => (compute_data_cid(data), data.len() as u64),
            _ => return Err(DwnError::AmbiguousData),
        };

        let date_published = match (options.published, options.date_published) {
            (Some(true), None) => Some(current_time.clone()),
            (_, date_published) => date_published,
        };

        let descriptor = RecordsWriteDescriptor {
            interface: Interface::Records,
            method: Method::Write,
            protocol: options.protocol,
            recipient: options.recipient,
            schema: options.schema,
            parent_id: options.parent_id,
            data_cid,
            data_size,
            date_created: options.date_created.unwrap_or_else(|| current_time.clone()),
            date_modified: options.date_modified.unwrap_or(current_time),
            published: options.published,
            date_published,
            data_format: options.data_format,
        };

        let signer = options.authorization_signer;
        let author = signer.did().to_string();

        let record_id = match options.record_id {
            Some(record_id) => record_id,
            None => compute_entry_id(&author, &descriptor)?,
        };

        // a protocol write without a given context is the root of a new one
        let context_id = match options.context_id {
            Some(context_id) => Some(context_id),
            None if descriptor.protocol.is_some() => Some(compute_entry_id(&author, &descriptor)?),
            None => None,
        };

        let descriptor_cid = compute_cid(&descriptor)?;
        let attestation = Self::create_attestation(&descriptor_cid, &options.attestation_signers)?;
        let authorization = Self::create_authorization(
            &record_id,
            context_id.as_deref(),
            &descriptor_cid,
            attestation.as_ref(),
            signer,
        )?;

        let message = RecordsWriteMessage {
            record_id,
            context_id,
            descriptor,
            authorization,
            attestation,
        };
        validate_message_shape(&message)?;

        Self::from_message(message)
    }

    /// Builds a follow-up write for the record of `options.base`.
    ///
    /// Immutable fields are copied from the base. When neither `published`
    /// nor `date_published` is given the base's published state carries
    /// over; a `date_published` alone means published. Publishing a record
    /// that was unpublished stamps a fresh `datePublished`, while a record
    /// that stays published keeps its original one.
    pub fn create_from(options: CreateFromOptions<'_>) -> Result<Self> {
        let base = options.base;
        let current_time = current_timestamp();

        let published = match (options.published, &options.date_published) {
            (Some(published), _) => Some(published),
            (None, Some(_)) => Some(true),
            (None, None) => base.descriptor.published,
        };

        let date_published = match options.date_published {
            Some(date_published) => Some(date_published),
            None if published == Some(true) => {
                if base.descriptor.is_published() {
                    base.descriptor.date_published.clone()
                } else {
                    Some(current_time.clone())
                }
            }
            None => None,
        };

        let (data_cid, data_size) = match options.data {
            Some(_) => (None, None),
            None => (
                Some(base.descriptor.data_cid.clone()),
                Some(base.descriptor.data_size),
            ),
        };

        Self::create(RecordsWriteOptions {
            recipient: base.descriptor.recipient.clone(),
            protocol: base.descriptor.protocol.clone(),
            context_id: base.context_id.clone(),
            schema: base.descriptor.schema.clone(),
            record_id: Some(base.record_id.clone()),
            parent_id: base.descriptor.parent_id.clone(),
            data: options.data,
            data_cid,
            data_size,
            date_created: Some(base.descriptor.date_created.clone()),
            date_modified: Some(options.date_modified.unwrap_or(current_time)),
            published,
            date_published,
            data_format: base.descriptor.data_format.clone(),
            authorization_signer: options.authorization_signer,
            attestation_signers: options.attestation_signers,
        })
    }

    fn from_message(message: RecordsWriteMessage) -> Result<Self> {
        let author = message.author()?;
        let entry_id = compute_entry_id(&author, &message.descriptor)?;
        let attesters = match &message.attestation {
            Some(attestation) => attestation.signer_dids()?,
            None => Vec::new(),
        };
        let authorization_payload = message.authorization.decode_payload()?;

        Ok(Self {
            message,
            author,
            entry_id,
            attesters,
            authorization_payload,
        })
    }

    /// Checks the write tenant ownership, or the protocol's rules when the
    /// write declares a protocol.
    pub async fn authorize(
        &self,
        tenant: &str,
        message_store: &dyn MessageStore,
        protocols: &dyn ProtocolAuthorizer,
    ) -> Result<()> {
        if self.message.descriptor.protocol.is_some() {
            protocols.authorize(tenant, self, message_store).await
        } else {
            authorize_owner(tenant, &self.author)
        }
    }

    fn validate_integrity(&self) -> Result<()> {
        let payload = &self.authorization_payload;

        if self.message.record_id != payload.record_id {
            return Err(DwnError::RecordIdMismatch {
                message: self.message.record_id.clone(),
                authorization: payload.record_id.clone(),
            });
        }

        if self.is_initial_write() {
            let descriptor = &self.message.descriptor;
            if descriptor.date_modified != descriptor.date_created {
                return Err(DwnError::InitialWriteDateMismatch {
                    date_created: descriptor.date_created.clone(),
                    date_modified: descriptor.date_modified.clone(),
                });
            }

            if descriptor.protocol.is_some() && descriptor.parent_id.is_none() {
                let expected = &self.entry_id;
                if self.message.context_id.as_ref() != Some(expected) {
                    return Err(DwnError::ContextIdMismatch(format!(
                        "contextId in message: {} does not match deterministic contextId: {expected}",
                        display_optional(&self.message.context_id)
                    )));
                }
            }
        }

        if self.message.context_id != payload.context_id {
            return Err(DwnError::ContextIdMismatch(format!(
                "contextId in message {} does not match contextId in authorization: {}",
                display_optional(&self.message.context_id),
                display_optional(&payload.context_id)
            )));
        }

        if let Some(attestation) = &self.message.attestation {
            let expected = compute_cid(attestation)?;
            if payload.attestation_cid.as_ref() != Some(&expected) {
                return Err(DwnError::AttestationCidMismatch {
                    expected,
                    actual: display_optional(&payload.attestation_cid),
                });
            }
        }

        Ok(())
    }

    /// Structural checks of the attestation; signatures are not verified.
    fn validate_attestation_integrity(message: &RecordsWriteMessage) -> Result<()> {
        let Some(attestation) = &message.attestation else {
            return Ok(());
        };

        // multi-attester is not supported yet
        if attestation.signatures.len() != 1 {
            return Err(DwnError::UnsupportedAttesterCount(attestation.signatures.len()));
        }

        let payload = attestation.decode_object_payload()?;
        let expected = compute_cid(&message.descriptor)?;
        match payload.get("descriptorCid").and_then(Value::as_str) {
            Some(actual) if actual == expected => {}
            actual => {
                return Err(DwnError::AttestationMismatch(format!(
                    "descriptorCid {} does not match expected descriptorCid {expected}",
                    actual.unwrap_or("(missing)")
                )))
            }
        }

        if payload.len() > 1 {
            return Err(DwnError::AttestationMismatch(format!(
                "only 'descriptorCid' is allowed in attestation payload, but got {} properties",
                payload.len()
            )));
        }

        Ok(())
    }

    /// Signs `{descriptorCid}` with each attester; `None` without attesters.
    pub fn create_attestation(
        descriptor_cid: &str,
        signers: &[&dyn Signer],
    ) -> Result<Option<GeneralJws>> {
        match signers.len() {
            0 => Ok(None),
            1 => {
                let payload = DescriptorCidPayload {
                    descriptor_cid: descriptor_cid.to_string(),
                };
                Ok(Some(GeneralJws::create_for(&payload, signers)?))
            }
            n => Err(DwnError::UnsupportedAttesterCount(n)),
        }
    }

    /// Signs the authorization payload binding the record, the context, the
    /// descriptor and the attestation (when present) to the author.
    pub fn create_authorization(
        record_id: &str,
        context_id: Option<&str>,
        descriptor_cid: &str,
        attestation: Option<&GeneralJws>,
        signer: &dyn Signer,
    ) -> Result<GeneralJws> {
        let attestation_cid = attestation.map(compute_cid).transpose()?;
        let payload = RecordsWriteAuthorizationPayload {
            record_id: record_id.to_string(),
            context_id: context_id.map(str::to_string),
            descriptor_cid: descriptor_cid.to_string(),
            attestation_cid,
        };
        GeneralJws::create_for(&payload, &[signer])
    }

    /// Fails when a descriptor field outside [`MUTABLE_PROPERTIES`] differs
    /// between two writes of the same record.
    pub fn verify_equality_of_immutable_properties(
        existing: &RecordsWriteMessage,
        incoming: &RecordsWriteMessage,
    ) -> Result<()> {
        let existing = descriptor_fields(&existing.descriptor)?;
        let incoming = descriptor_fields(&incoming.descriptor)?;

        let names: BTreeSet<&String> = existing.keys().chain(incoming.keys()).collect();
        for name in names {
            if MUTABLE_PROPERTIES.contains(&name.as_str()) {
                continue;
            }
            let before = existing.get(name);
            let after = incoming.get(name);
            if before != after {
                return Err(DwnError::ImmutablePropertyViolation {
                    property: name.clone(),
                    existing: display_value(before),
                    incoming: display_value(after),
                });
            }
        }
        Ok(())
    }

    pub fn is_initial_write(&self) -> bool {
        self.entry_id == self.message.record_id
    }

    /// Whether `message` is the initial write of its record.
    pub fn is_initial_write_message(message: &RecordsWriteMessage) -> Result<bool> {
        if message.descriptor.interface != Interface::Records
            || message.descriptor.method != Method::Write
        {
            return Ok(false);
        }
        let entry_id = compute_entry_id(&message.author()?, &message.descriptor)?;
        Ok(entry_id == message.record_id)
    }

    /// Whether `a` is older than `b`.
    ///
    /// Orders by `dateModified`; equal timestamps fall back to the message
    /// CIDs so the order is total.
    pub fn is_older(a: &RecordsWriteMessage, b: &RecordsWriteMessage) -> Result<bool> {
        let (a_modified, b_modified) = (&a.descriptor.date_modified, &b.descriptor.date_modified);
        if a_modified != b_modified {
            return Ok(a_modified.as_bytes() < b_modified.as_bytes());
        }
        Ok(a.cid()?.as_bytes() < b.cid()?.as_bytes())
    }

    /// The newest of `messages`, `None` when empty.
    pub fn newest_message<'m, I>(messages: I) -> Result<Option<&'m RecordsWriteMessage>>
    where
        I: IntoIterator<Item = &'m RecordsWriteMessage>,
    {
        let mut newest: Option<&RecordsWriteMessage> = None;
        for message in messages {
            newest = match newest {
                Some(current) if !Self::is_older(current, message)? => Some(current),
                _ => Some(message),
            };
        }
        Ok(newest)
    }

    /// The initial write among `messages`.
    pub fn initial_write(messages: &[RecordsWriteMessage]) -> Result<&RecordsWriteMessage> {
        for message in messages {
            if Self::is_initial_write_message(message)? {
                return Ok(message);
            }
        }
        Err(DwnError::InitialWriteNotFound)
    }

    pub fn message(&self) -> &RecordsWriteMessage {
        &self.message
    }

    pub fn into_message(self) -> RecordsWriteMessage {
        self.message
    }

    /// The message without its authorization, for use as a follow-up base
    pub fn to_unsigned(&self) -> UnsignedRecordsWriteMessage {
        UnsignedRecordsWriteMessage::from(&self.message)
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn record_id(&self) -> &str {
        &self.message.record_id
    }

    /// DIDs of the attestation signers
    pub fn attesters(&self) -> &[String] {
        &self.attesters
    }

    pub fn authorization_payload(&self) -> &RecordsWriteAuthorizationPayload {
        &self.authorization_payload
    }
}

/// Field-level checks that the typed shape alone does not enforce
fn validate_message_shape(message: &RecordsWriteMessage) -> Result<()> {
    let descriptor = &message.descriptor;
    if descriptor.interface != Interface::Records || descriptor.method != Method::Write {
        return Err(DwnError::MalformedMessage(format!(
            "expected Records Write, got {} {}",
            descriptor.interface, descriptor.method
        )));
    }

    let mut timestamps = vec![
        ("dateCreated", &descriptor.date_created),
        ("dateModified", &descriptor.date_modified),
    ];
    if let Some(date_published) = &descriptor.date_published {
        timestamps.push(("datePublished", date_published));
    }
    for (name, value) in timestamps {
        if parse_timestamp(value).is_none() {
            return Err(DwnError::MalformedMessage(format!(
                "{name} is not a valid timestamp: {value}"
            )));
        }
    }

    parse_cid(&descriptor.data_cid)?;
    if descriptor.data_format.is_empty() {
        return Err(DwnError::MalformedMessage("dataFormat must not be empty".to_string()));
    }
    Ok(())
}

fn descriptor_fields(descriptor: &RecordsWriteDescriptor) -> Result<Map<String, Value>> {
    match serde_json::to_value(descriptor)? {
        Value::Object(map) => Ok(map),
        _ => Err(DwnError::MalformedMessage("descriptor must be an object".to_string())),
    }
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "(absent)".to_string(),
    }
}

fn display_optional(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "(absent)".to_string())
}
