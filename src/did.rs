//! DID Resolution
//!
//! Resolves signer DIDs to DID documents so message signatures can be
//! verified. `did:key` identities are self-describing: the Ed25519 public key
//! is multibase-encoded in the DID itself, so no network access is needed.
//!
//! Other methods plug in through the [`DidResolver`] trait.

use crate::error::{DwnError, Result};
use async_trait::async_trait;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Multicodec prefix for an Ed25519 public key (varint 0xed)
const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

/// Resolves DIDs to their documents
#[async_trait]
pub trait DidResolver: Send + Sync {
    async fn resolve(&self, did: &str) -> Result<DidDocument>;
}

/// The parts of a DID document that signature verification reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DidDocument {
    /// `@context` URIs, kept for round-tripping
    #[serde(rename = "@context", default)]
    pub context: Vec<String>,

    pub id: String,

    /// Keys a `kid` can point at
    #[serde(rename = "verificationMethod", default)]
    pub verification_method: Vec<VerificationMethod>,

    #[serde(default)]
    pub authentication: Vec<String>,
}

/// A single key entry; only `publicKeyMultibase` keys are understood
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub controller: String,
    #[serde(rename = "publicKeyMultibase", skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<String>,
}

impl DidDocument {
    /// Finds the verification method referenced by a signature `kid`.
    ///
    /// Matches the full DID URL first, then a relative `#fragment` id.
    pub fn find_verification_method(&self, kid: &str) -> Option<&VerificationMethod> {
        let fragment = kid.split_once('#').map(|(_, f)| f);
        self.verification_method.iter().find(|vm| {
            vm.id == kid
                || fragment.is_some_and(|f| vm.id == format!("#{f}") || vm.id.ends_with(&format!("#{f}")))
        })
    }
}

impl VerificationMethod {
    /// Decodes the Ed25519 public key of this method.
    pub fn ed25519_key(&self) -> Result<VerifyingKey> {
        let multibase = self.public_key_multibase.as_deref().ok_or_else(|| {
            DwnError::AuthenticationFailed(format!("{} has no publicKeyMultibase", self.id))
        })?;
        decode_ed25519_multibase(multibase)
            .map_err(|e| DwnError::AuthenticationFailed(format!("{}: {e}", self.id)))
    }
}

/// Cache policy of [`DidKeyResolver`]
#[derive(Debug, Clone)]
pub struct DidResolverConfig {
    /// How long a resolved document is reused
    pub cache_ttl: Duration,
    /// Upper bound on cached documents
    pub max_cache_entries: usize,
}

impl Default for DidResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            max_cache_entries: 1000,
        }
    }
}

struct CachedDocument {
    document: DidDocument,
    expires_at: Instant,
}

/// Resolver for `did:key` identities, with a bounded TTL cache
pub struct DidKeyResolver {
    config: DidResolverConfig,
    cache: RwLock<HashMap<String, CachedDocument>>,
}

impl DidKeyResolver {
    pub fn new() -> Self {
        Self::with_config(DidResolverConfig::default())
    }

    pub fn with_config(config: DidResolverConfig) -> Self {
        Self {
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn get_cached(&self, did: &str) -> Option<DidDocument> {
        let cache = self.cache.read().await;
        cache.get(did).and_then(|cached| {
            if cached.expires_at > Instant::now() {
                Some(cached.document.clone())
            } else {
                None
            }
        })
    }

    async fn cache_document(&self, did: &str, document: DidDocument) {
        let mut cache = self.cache.write().await;
        let now = Instant::now();

        if cache.len() >= self.config.max_cache_entries {
            cache.retain(|_, cached| cached.expires_at > now);
        }
        if cache.len() >= self.config.max_cache_entries {
            // entries closest to expiry were resolved longest ago
            let mut by_expiry: Vec<(Instant, String)> = cache
                .iter()
                .map(|(did, cached)| (cached.expires_at, did.clone()))
                .collect();
            by_expiry.sort();
            let excess = cache.len() + 1 - self.config.max_cache_entries;
            for (_, stale) in by_expiry.into_iter().take(excess) {
                cache.remove(&stale);
            }
        }

        cache.insert(
            did.to_string(),
            CachedDocument {
                document,
                expires_at: now + self.config.cache_ttl,
            },
        );
    }

    /// Number of cached documents, expired or not
    pub async fn cached_entries(&self) -> usize {
        self.cache.read().await.len()
    }

    fn resolve_did_key(did: &str) -> Result<DidDocument> {
        let key_part = did
            .strip_prefix("did:key:")
            .ok_or_else(|| DwnError::AuthenticationFailed(format!("unsupported DID method: {did}")))?;

        // validates the key before building a document around it
        decode_ed25519_multibase(key_part)
            .map_err(|e| DwnError::AuthenticationFailed(format!("invalid did:key {did}: {e}")))?;

        let vm_id = format!("{did}#{key_part}");
        Ok(DidDocument {
            context: vec![
                "https://www.w3.org/ns/did/v1".to_string(),
                "https://w3id.org/security/suites/ed25519-2020/v1".to_string(),
            ],
            id: did.to_string(),
            verification_method: vec![VerificationMethod {
                id: vm_id.clone(),
                method_type: "Ed25519VerificationKey2020".to_string(),
                controller: did.to_string(),
                public_key_multibase: Some(key_part.to_string()),
            }],
            authentication: vec![vm_id],
        })
    }
}

impl Default for DidKeyResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DidResolver for DidKeyResolver {
    async fn resolve(&self, did: &str) -> Result<DidDocument> {
        if let Some(doc) = self.get_cached(did).await {
            debug!(did = %did, "DID resolved from cache");
            return Ok(doc);
        }

        let document = Self::resolve_did_key(did)?;
        self.cache_document(did, document.clone()).await;
        Ok(document)
    }
}

/// Builds the `did:key` for an Ed25519 public key
pub fn did_key_from_verifying_key(key: &VerifyingKey) -> String {
    let mut bytes = Vec::with_capacity(34);
    bytes.extend_from_slice(&ED25519_MULTICODEC);
    bytes.extend_from_slice(key.as_bytes());
    format!("did:key:z{}", bs58::encode(bytes).into_string())
}

/// Decodes a base58btc multibase (`z...`) Ed25519 public key
fn decode_ed25519_multibase(value: &str) -> std::result::Result<VerifyingKey, String> {
    let encoded = value
        .strip_prefix('z')
        .ok_or_else(|| "key must use base58btc encoding (z prefix)".to_string())?;
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| format!("invalid base58btc: {e}"))?;

    let raw = bytes
        .strip_prefix(&ED25519_MULTICODEC)
        .ok_or_else(|| "not an Ed25519 multicodec key".to_string())?;
    let raw: [u8; 32] = raw
        .try_into()
        .map_err(|_| format!("expected 32 key bytes, got {}", raw.len()))?;

    VerifyingKey::from_bytes(&raw).map_err(|e| format!("invalid public key: {e}"))
}
