//! General JWS envelopes
//!
//! Authorization and attestation payloads travel as general JWS objects:
//! a base64url payload plus one entry per signer, each with its own protected
//! header. The signer identity is the DID in the header's `kid`.
//!
//! Key material is hidden behind [`Signer`]; [`Ed25519Signer`] is the
//! implementation used by the node and its tests.

use crate::did::did_key_from_verifying_key;
use crate::error::{DwnError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JWS `alg` for Ed25519 signatures
pub const ALG_EDDSA: &str = "EdDSA";

/// A general JWS with one or more signatures over the same payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralJws {
    pub payload: String,
    pub signatures: Vec<SignatureEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub protected: String,
    pub signature: String,
}

/// Protected header of a single signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedHeader {
    pub alg: String,
    pub kid: String,
}

/// Opaque signing capability.
///
/// `key_id` is a DID URL (`<did>#<fragment>`) that verifiers resolve to find
/// the public key.
pub trait Signer: Send + Sync {
    fn key_id(&self) -> &str;

    fn algorithm(&self) -> &str;

    fn sign(&self, content: &[u8]) -> Result<Vec<u8>>;

    /// DID of the signer
    fn did(&self) -> &str {
        extract_did(self.key_id())
    }
}

/// Ed25519 signer bound to a `did:key` identity
pub struct Ed25519Signer {
    signing_key: SigningKey,
    did: String,
    key_id: String,
}

impl Ed25519Signer {
    /// Generate a fresh keypair and its `did:key`
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let did = did_key_from_verifying_key(&signing_key.verifying_key());
        let fragment = did.trim_start_matches("did:key:").to_string();
        let key_id = format!("{did}#{fragment}");
        Self {
            signing_key,
            did,
            key_id,
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl Signer for Ed25519Signer {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn algorithm(&self) -> &str {
        ALG_EDDSA
    }

    fn sign(&self, content: &[u8]) -> Result<Vec<u8>> {
        Ok(self.signing_key.sign(content).to_bytes().to_vec())
    }

    fn did(&self) -> &str {
        &self.did
    }
}

/// The DID portion of a DID URL key id
pub fn extract_did(kid: &str) -> &str {
    kid.split('#').next().unwrap_or(kid)
}

pub fn base64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn base64url_decode(value: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| DwnError::MalformedMessage(format!("invalid base64url: {e}")))
}

impl GeneralJws {
    /// Signs `payload` with each signer in order.
    pub fn create(payload: &[u8], signers: &[&dyn Signer]) -> Result<Self> {
        let payload = base64url_encode(payload);
        let mut signatures = Vec::with_capacity(signers.len());

        for signer in signers {
            let header = ProtectedHeader {
                alg: signer.algorithm().to_string(),
                kid: signer.key_id().to_string(),
            };
            let protected = base64url_encode(&serde_json::to_vec(&header)?);
            let signing_input = signing_input(&protected, &payload);
            let signature = base64url_encode(&signer.sign(&signing_input)?);
            signatures.push(SignatureEntry {
                protected,
                signature,
            });
        }

        Ok(Self {
            payload,
            signatures,
        })
    }

    /// Encodes `payload` as JSON and signs it.
    pub fn create_for<T: Serialize>(payload: &T, signers: &[&dyn Signer]) -> Result<Self> {
        Self::create(&serde_json::to_vec(payload)?, signers)
    }

    pub fn payload_bytes(&self) -> Result<Vec<u8>> {
        base64url_decode(&self.payload)
    }

    /// Decodes the payload into a typed structure.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.payload_bytes()?)
            .map_err(|e| DwnError::MalformedMessage(format!("invalid JWS payload: {e}")))
    }

    /// Decodes the payload as a plain JSON object.
    pub fn decode_object_payload(&self) -> Result<Map<String, Value>> {
        match self.decode_payload::<Value>()? {
            Value::Object(map) => Ok(map),
            _ => Err(DwnError::MalformedMessage(
                "JWS payload must be a JSON object".to_string(),
            )),
        }
    }

    /// DIDs of all signers, in signature order.
    pub fn signer_dids(&self) -> Result<Vec<String>> {
        self.signatures
            .iter()
            .map(|s| s.signer_did())
            .collect()
    }
}

impl SignatureEntry {
    pub fn header(&self) -> Result<ProtectedHeader> {
        serde_json::from_slice(&base64url_decode(&self.protected)?)
            .map_err(|e| DwnError::MalformedMessage(format!("invalid protected header: {e}")))
    }

    pub fn signer_did(&self) -> Result<String> {
        Ok(extract_did(&self.header()?.kid).to_string())
    }

    pub fn signature_bytes(&self) -> Result<Vec<u8>> {
        base64url_decode(&self.signature)
    }
}

/// JWS signing input: `protected || '.' || payload`
pub fn signing_input(protected: &str, payload: &str) -> Vec<u8> {
    format!("{protected}.{payload}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};
    use serde_json::json;

    #[test]
    fn test_signer_key_id_is_did_url() {
        let signer = Ed25519Signer::generate();
        assert!(signer.did().starts_with("did:key:z"));
        assert!(signer.key_id().starts_with(signer.did()));
        assert_eq!(extract_did(signer.key_id()), signer.did());
    }

    #[test]
    fn test_create_signs_every_signer() {
        let alice = Ed25519Signer::generate();
        let bob = Ed25519Signer::generate();
        let jws = GeneralJws::create_for(&json!({ "descriptorCid": "bafy" }), &[&alice, &bob]).unwrap();

        assert_eq!(jws.signatures.len(), 2);
        assert_eq!(
            jws.signer_dids().unwrap(),
            vec![alice.did().to_string(), bob.did().to_string()]
        );

        let entry = &jws.signatures[0];
        let sig_bytes: [u8; 64] = entry.signature_bytes().unwrap().try_into().unwrap();
        let signature = Signature::from_bytes(&sig_bytes);
        let input = signing_input(&entry.protected, &jws.payload);
        assert!(alice.verifying_key().verify(&input, &signature).is_ok());
        assert!(bob.verifying_key().verify(&input, &signature).is_err());
    }

    #[test]
    fn test_decode_object_payload() {
        let signer = Ed25519Signer::generate();
        let jws = GeneralJws::create_for(&json!({ "a": 1, "b": "two" }), &[&signer]).unwrap();
        let payload = jws.decode_object_payload().unwrap();
        assert_eq!(payload.len(), 2);

        let not_object = GeneralJws::create(b"[1,2]", &[&signer]).unwrap();
        assert!(not_object.decode_object_payload().is_err());
    }

    #[test]
    fn test_bad_base64_is_malformed() {
        let jws = GeneralJws {
            payload: "***".to_string(),
            signatures: vec![],
        };
        assert!(matches!(jws.payload_bytes(), Err(DwnError::MalformedMessage(_))));
    }
}
