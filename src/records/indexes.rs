//! Index fields stored alongside each accepted write

use crate::error::{DwnError, Result};
use crate::records::write::RecordsWrite;
use crate::store::{IndexValue, Indexes};
use serde_json::Value;

/// Index field names shared by the handlers and the query filters
pub mod fields {
    pub const INTERFACE: &str = "interface";
    pub const METHOD: &str = "method";
    pub const AUTHOR: &str = "author";
    pub const RECIPIENT: &str = "recipient";
    pub const PUBLISHED: &str = "published";
    pub const RECORD_ID: &str = "recordId";
    pub const ENTRY_ID: &str = "entryId";
    pub const CONTEXT_ID: &str = "contextId";
    pub const DATE_CREATED: &str = "dateCreated";
    pub const IS_LATEST_BASE_STATE: &str = "isLatestBaseState";
}

/// Builds the indexes a write is stored with.
///
/// Every descriptor field is indexed as-is; `published` is always present so
/// unpublished records can be matched explicitly.
pub fn construct_records_write_indexes(
    write: &RecordsWrite,
    is_latest_base_state: bool,
) -> Result<Indexes> {
    let message = write.message();
    let mut indexes = Indexes::new();

    let Value::Object(descriptor) = serde_json::to_value(&message.descriptor)? else {
        return Err(DwnError::MalformedMessage("descriptor must be an object".to_string()));
    };
    for (name, value) in descriptor {
        let value = match value {
            Value::String(s) => IndexValue::String(s),
            Value::Bool(b) => IndexValue::Bool(b),
            Value::Number(n) => match n.as_u64() {
                Some(n) => IndexValue::Number(n),
                None => continue,
            },
            _ => continue,
        };
        indexes.insert(name, value);
    }

    indexes.insert(
        fields::PUBLISHED.to_string(),
        message.descriptor.is_published().into(),
    );
    indexes.insert(fields::AUTHOR.to_string(), write.author().into());
    indexes.insert(fields::RECORD_ID.to_string(), message.record_id.as_str().into());
    indexes.insert(fields::ENTRY_ID.to_string(), write.entry_id().into());
    if let Some(context_id) = &message.context_id {
        indexes.insert(fields::CONTEXT_ID.to_string(), context_id.as_str().into());
    }
    indexes.insert(
        fields::IS_LATEST_BASE_STATE.to_string(),
        is_latest_base_state.into(),
    );

    Ok(indexes)
}
