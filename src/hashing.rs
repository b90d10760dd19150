//! Canonical hashing and content identifiers
//!
//! Every identity in the records interface (entry ids, record ids, context
//! ids, descriptor and attestation references) is a CID over a canonical
//! encoding of a structured value:
//!
//! 1. the value is converted to a JSON tree,
//! 2. any `null` in the tree is rejected (absent optional fields must be
//!    omitted, never encoded),
//! 3. the tree is serialized with RFC 8785 canonical JSON (sorted keys),
//! 4. the bytes are hashed with SHA2-256 and wrapped in a CIDv1.
//!
//! Raw payload bytes use the `raw` codec instead.

use crate::error::{DwnError, Result};
use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};
use serde::Serialize;
use serde_json::Value;

/// Multicodec for dag-json encoded structured values
pub const DAG_JSON_CODEC: u64 = 0x0129;

/// Multicodec for raw bytes
pub const RAW_CODEC: u64 = 0x55;

/// Computes the CID of a structured value.
pub fn compute_cid<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let bytes = canonical_bytes(value)?;
    let hash = Code::Sha2_256.digest(&bytes);
    Ok(Cid::new_v1(DAG_JSON_CODEC, hash).to_string())
}

/// Computes the CID of raw payload bytes.
pub fn compute_data_cid(data: &[u8]) -> String {
    let hash = Code::Sha2_256.digest(data);
    Cid::new_v1(RAW_CODEC, hash).to_string()
}

/// Canonical byte encoding of a structured value.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let tree = serde_json::to_value(value)
        .map_err(|e| DwnError::Canonicalization(e.to_string()))?;
    reject_absent_values(&tree, "$")?;
    serde_jcs::to_vec(&tree).map_err(|e| DwnError::Canonicalization(e.to_string()))
}

/// Computes the deterministic entry id of a descriptor for a given author.
///
/// The descriptor's own fields plus an `author` field are hashed together, so
/// the id does not depend on any signature material.
pub fn compute_entry_id<T: Serialize + ?Sized>(author: &str, descriptor: &T) -> Result<String> {
    let mut input = match serde_json::to_value(descriptor)
        .map_err(|e| DwnError::Canonicalization(e.to_string()))?
    {
        Value::Object(map) => map,
        other => {
            return Err(DwnError::Canonicalization(format!(
                "descriptor must be an object, got {other}"
            )))
        }
    };
    input.insert("author".to_string(), Value::String(author.to_string()));
    compute_cid(&Value::Object(input))
}

/// Parses a CID string, used to validate references before touching storage.
pub fn parse_cid(value: &str) -> Result<Cid> {
    Cid::try_from(value).map_err(|e| DwnError::MalformedMessage(format!("invalid CID {value}: {e}")))
}

fn reject_absent_values(value: &Value, path: &str) -> Result<()> {
    match value {
        Value::Null => Err(DwnError::Canonicalization(format!(
            "absent value at {path} cannot be encoded"
        ))),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| reject_absent_values(item, &format!("{path}[{i}]"))),
        Value::Object(map) => map
            .iter()
            .try_for_each(|(key, item)| reject_absent_values(item, &format!("{path}.{key}"))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": {"y": true, "x": "s"}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"x": "s", "y": true}, "b": 1}"#).unwrap();
        assert_eq!(compute_cid(&a).unwrap(), compute_cid(&b).unwrap());
    }

    #[test]
    fn test_null_is_rejected() {
        let value = json!({ "schema": null, "dataFormat": "text/plain" });
        let err = compute_cid(&value).unwrap_err();
        assert!(matches!(err, DwnError::Canonicalization(_)));
        assert!(err.to_string().contains("$.schema"));

        let nested = json!({ "filter": { "items": [1, null] } });
        assert!(compute_cid(&nested).is_err());
    }

    #[test]
    fn test_entry_id_depends_on_author() {
        let descriptor = json!({ "interface": "Records", "method": "Write", "dataFormat": "x" });
        let alice = compute_entry_id("did:key:alice", &descriptor).unwrap();
        let alice_again = compute_entry_id("did:key:alice", &descriptor).unwrap();
        let bob = compute_entry_id("did:key:bob", &descriptor).unwrap();
        assert_eq!(alice, alice_again);
        assert_ne!(alice, bob);
    }

    #[test]
    fn test_entry_ids_distinct_across_corpus() {
        let mut seen = std::collections::HashSet::new();
        for author in ["did:key:a", "did:key:b", "did:key:c"] {
            for size in 0..20u64 {
                let descriptor = json!({ "dataSize": size, "dataFormat": "application/json" });
                assert!(seen.insert(compute_entry_id(author, &descriptor).unwrap()));
            }
        }
        assert_eq!(seen.len(), 60);
    }

    #[test]
    fn test_data_cid_uses_raw_codec() {
        let cid = compute_data_cid(b"hello");
        let parsed = parse_cid(&cid).unwrap();
        assert_eq!(parsed.codec(), RAW_CODEC);
        assert_eq!(parsed.version(), cid::Version::V1);
        assert_ne!(cid, compute_cid(&json!("hello")).unwrap());
    }

    #[test]
    fn test_parse_cid_rejects_garbage() {
        assert!(matches!(parse_cid("not-a-cid"), Err(DwnError::MalformedMessage(_))));
    }
}
