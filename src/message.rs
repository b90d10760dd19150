//! Message base shared by all interface methods

use crate::error::{DwnError, Result};
use crate::hashing::compute_cid;
use crate::jws::GeneralJws;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interface {
    Records,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Write,
    Query,
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interface::Records => write!(f, "Records"),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Write => write!(f, "Write"),
            Method::Query => write!(f, "Query"),
        }
    }
}

/// Common view over signed messages.
///
/// Each message kind owns its descriptor type; the authorization envelope and
/// author derivation are shared.
pub trait DwnMessage: Serialize {
    type Descriptor: Serialize;

    fn descriptor(&self) -> &Self::Descriptor;

    fn authorization(&self) -> &GeneralJws;

    fn interface(&self) -> Interface;

    fn method(&self) -> Method;

    /// DID of the signer of the authorization.
    fn author(&self) -> Result<String> {
        self.authorization()
            .signatures
            .first()
            .ok_or_else(|| DwnError::MalformedMessage("authorization has no signature".to_string()))?
            .signer_did()
    }

    /// Content identifier of the whole message.
    fn cid(&self) -> Result<String> {
        compute_cid(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_serialize_as_protocol_strings() {
        assert_eq!(serde_json::to_string(&Interface::Records).unwrap(), "\"Records\"");
        assert_eq!(serde_json::to_string(&Method::Write).unwrap(), "\"Write\"");
        assert_eq!(Method::Query.to_string(), "Query");
        assert!(serde_json::from_str::<Method>("\"Delete\"").is_err());
    }
}
