//! Error types for dwn-records

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, DwnError>;

#[derive(Error, Debug)]
pub enum DwnError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Authorization mismatch: {0}")]
    AuthorizationMismatch(String),

    #[error("Attestation mismatch: {0}")]
    AttestationMismatch(String),

    #[error("Only 1 attester is supported, but got {0}")]
    UnsupportedAttesterCount(usize),

    #[error("One and only one of `data` and `dataCid` must be given")]
    AmbiguousData,

    #[error("`dataCid` and `dataSize` must both be given or both be omitted")]
    InconsistentDataReference,

    #[error("recordId in message {message} does not match recordId in authorization: {authorization}")]
    RecordIdMismatch {
        message: String,
        authorization: String,
    },

    #[error("contextId mismatch: {0}")]
    ContextIdMismatch(String),

    #[error("dateModified {date_modified} must match dateCreated {date_created} for the initial write")]
    InitialWriteDateMismatch {
        date_created: String,
        date_modified: String,
    },

    #[error("CID {expected} of attestation does not match attestationCid in authorization: {actual}")]
    AttestationCidMismatch { expected: String, actual: String },

    #[error("{property} is an immutable property: cannot change '{existing}' to '{incoming}'")]
    ImmutablePropertyViolation {
        property: String,
        existing: String,
        incoming: String,
    },

    #[error("{author} is not allowed to query records intended for another recipient: {recipient}")]
    RecipientFilterMismatch { author: String, recipient: String },

    #[error("Initial write is not found")]
    InitialWriteNotFound,

    #[error("Data mismatch: {0}")]
    DataMismatch(String),

    #[error("Value is not canonicalizable: {0}")]
    Canonicalization(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
}

impl DwnError {
    /// Status code used when this error is turned into a reply.
    ///
    /// 400 for anything the caller can correct, 401 for identity and
    /// permission failures, 500 for store and infrastructure failures.
    pub fn status_code(&self) -> u16 {
        match self {
            DwnError::AuthenticationFailed(_) | DwnError::NotAuthorized(_) => 401,
            DwnError::RecipientFilterMismatch { .. } => 401,
            DwnError::Store(_) | DwnError::Io(_) | DwnError::Database(_) => 500,
            _ => 400,
        }
    }

    /// Whether the error originated below the message layer
    pub fn is_store_failure(&self) -> bool {
        self.status_code() == 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_tiers() {
        assert_eq!(DwnError::MalformedMessage("x".into()).status_code(), 400);
        assert_eq!(DwnError::AmbiguousData.status_code(), 400);
        assert_eq!(
            DwnError::ImmutablePropertyViolation {
                property: "schema".into(),
                existing: "a".into(),
                incoming: "b".into(),
            }
            .status_code(),
            400
        );
        assert_eq!(DwnError::AuthenticationFailed("x".into()).status_code(), 401);
        assert_eq!(DwnError::NotAuthorized("x".into()).status_code(), 401);
        assert_eq!(
            DwnError::RecipientFilterMismatch {
                author: "did:a".into(),
                recipient: "did:b".into(),
            }
            .status_code(),
            401
        );
        assert!(DwnError::Store("down".into()).is_store_failure());
    }

    #[test]
    fn test_immutable_violation_names_field() {
        let err = DwnError::ImmutablePropertyViolation {
            property: "schema".into(),
            existing: "a".into(),
            incoming: "b".into(),
        };
        assert!(err.to_string().starts_with("schema is an immutable property"));
    }
}
