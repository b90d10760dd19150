//! Authorization envelope checks shared by every message kind
//!
//! Structural checks (descriptor binding, allowed payload properties) happen
//! before any I/O. Cryptographic verification needs the signer's DID document
//! and therefore goes through the [`DidResolver`].

use crate::did::DidResolver;
use crate::error::{DwnError, Result};
use crate::hashing::compute_cid;
use crate::jws::{signing_input, GeneralJws, ALG_EDDSA};
use ed25519_dalek::{Signature, Verifier};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Validates the structural integrity of an authorization JWS.
///
/// The payload must carry `descriptorCid` equal to the CID of `descriptor`,
/// and any other payload property must appear in `allowed_properties`.
/// Signatures are not verified here.
pub fn validate_authorization_integrity<D: Serialize>(
    descriptor: &D,
    authorization: &GeneralJws,
    allowed_properties: &HashSet<&str>,
) -> Result<()> {
    if authorization.signatures.len() != 1 {
        return Err(DwnError::MalformedMessage(format!(
            "expected exactly 1 authorization signature, got {}",
            authorization.signatures.len()
        )));
    }

    let payload = authorization.decode_object_payload()?;

    let expected = compute_cid(descriptor)?;
    match payload.get("descriptorCid").and_then(|v| v.as_str()) {
        Some(actual) if actual == expected => {}
        Some(actual) => {
            return Err(DwnError::AuthorizationMismatch(format!(
                "provided descriptorCid {actual} does not match expected CID {expected}"
            )))
        }
        None => {
            return Err(DwnError::AuthorizationMismatch(
                "authorization payload is missing descriptorCid".to_string(),
            ))
        }
    }

    for key in payload.keys() {
        if key != "descriptorCid" && !allowed_properties.contains(key.as_str()) {
            return Err(DwnError::AuthorizationMismatch(format!(
                "{key} not allowed in authorization payload"
            )));
        }
    }

    Ok(())
}

/// Verifies every signature of `jws` against its signer's resolved key.
pub async fn authenticate(jws: &GeneralJws, resolver: &dyn DidResolver) -> Result<()> {
    for entry in &jws.signatures {
        let header = entry
            .header()
            .map_err(|e| DwnError::AuthenticationFailed(e.to_string()))?;
        if header.alg != ALG_EDDSA {
            return Err(DwnError::AuthenticationFailed(format!(
                "unsupported signature algorithm {}",
                header.alg
            )));
        }

        let did = crate::jws::extract_did(&header.kid);
        let document = resolver
            .resolve(did)
            .await
            .map_err(|e| DwnError::AuthenticationFailed(e.to_string()))?;
        let method = document.find_verification_method(&header.kid).ok_or_else(|| {
            DwnError::AuthenticationFailed(format!("verification method {} not found", header.kid))
        })?;
        let key = method.ed25519_key()?;

        let sig_bytes: [u8; 64] = entry
            .signature_bytes()
            .map_err(|e| DwnError::AuthenticationFailed(e.to_string()))?
            .try_into()
            .map_err(|_| DwnError::AuthenticationFailed("signature must be 64 bytes".to_string()))?;
        let signature = Signature::from_bytes(&sig_bytes);

        key.verify(&signing_input(&entry.protected, &jws.payload), &signature)
            .map_err(|_| {
                DwnError::AuthenticationFailed(format!("signature verification failed for {did}"))
            })?;

        debug!(did = %did, "signature verified");
    }
    Ok(())
}

/// Plain tenant-ownership authorization: only the tenant may act.
pub fn authorize_owner(tenant: &str, author: &str) -> Result<()> {
    if author == tenant {
        Ok(())
    } else {
        Err(DwnError::NotAuthorized(format!(
            "{author} is not the owner of tenant {tenant}"
        )))
    }
}
