//! Content-addressed payload storage on the local filesystem
//!
//! Payloads are stored per tenant under their `dataCid`, with the first
//! characters of the CID as a subdirectory for better filesystem
//! distribution:
//!
//! ```text
//! <root>/
//! └── <tenant partition>/
//!     └── <cid[4..8]>/
//!         └── bafkrei...
//! ```

use super::{DataStore, PutResult};
use crate::error::{DwnError, Result};
use crate::hashing::{compute_data_cid, parse_cid};
use async_trait::async_trait;
use bytes::Bytes;
use multihash_codetable::{Code, MultihashDigest};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

pub struct FsDataStore {
    /// Root directory for payload storage
    root_dir: PathBuf,
}

impl FsDataStore {
    /// Create a new data store at the given directory
    pub async fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        fs::create_dir_all(&root_dir).await?;
        info!(path = %root_dir.display(), "Initialized data store");
        Ok(Self { root_dir })
    }

    /// Tenants are DIDs, which contain `:`; the partition name is a hash of the DID.
    fn partition_dir(&self, tenant: &str) -> PathBuf {
        let digest = Code::Sha2_256.digest(tenant.as_bytes());
        let name: String = digest
            .digest()
            .iter()
            .take(16)
            .map(|b| format!("{b:02x}"))
            .collect();
        self.root_dir.join(name)
    }

    fn data_path(&self, tenant: &str, data_cid: &str) -> Result<PathBuf> {
        // rejects anything that is not a CID before it becomes a path
        parse_cid(data_cid)?;
        // skip the shared multibase/version/codec prefix
        let shard = data_cid.get(4..8).unwrap_or(data_cid);
        Ok(self.partition_dir(tenant).join(shard).join(data_cid))
    }
}

#[async_trait]
impl DataStore for FsDataStore {
    async fn put(&self, tenant: &str, record_id: &str, data: Bytes) -> Result<PutResult> {
        let data_cid = compute_data_cid(&data);
        let data_size = data.len() as u64;
        let path = self.data_path(tenant, &data_cid)?;

        if fs::metadata(&path).await.is_ok() {
            debug!(tenant = %tenant, data_cid = %data_cid, "Data already exists");
            return Ok(PutResult {
                data_cid,
                data_size,
                already_existed: true,
            });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &data).await?;

        info!(tenant = %tenant, record_id = %record_id, data_cid = %data_cid, size = data_size, "Stored data");
        Ok(PutResult {
            data_cid,
            data_size,
            already_existed: false,
        })
    }

    async fn get(&self, tenant: &str, _record_id: &str, data_cid: &str) -> Result<Option<Bytes>> {
        let path = self.data_path(tenant, data_cid)?;
        if fs::metadata(&path).await.is_err() {
            return Ok(None);
        }

        let content = fs::read(&path).await?;
        let computed = compute_data_cid(&content);
        if computed != data_cid {
            return Err(DwnError::DataMismatch(format!(
                "stored data for {data_cid} hashes to {computed}"
            )));
        }
        Ok(Some(Bytes::from(content)))
    }

    async fn has(&self, tenant: &str, _record_id: &str, data_cid: &str) -> Result<bool> {
        Ok(fs::metadata(self.data_path(tenant, data_cid)?).await.is_ok())
    }

    async fn delete(&self, tenant: &str, _record_id: &str, data_cid: &str) -> Result<()> {
        let path = self.data_path(tenant, data_cid)?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        info!(tenant = %tenant, data_cid = %data_cid, "Deleted data");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = fs::read_dir(&self.root_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await?;
            } else {
                fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_and_retrieve() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsDataStore::new(temp_dir.path()).await.unwrap();

        let data = Bytes::from_static(b"Hello, records!");
        let result = store.put("did:key:alice", "r1", data.clone()).await.unwrap();

        assert_eq!(result.data_cid, compute_data_cid(&data));
        assert_eq!(result.data_size, data.len() as u64);
        assert!(!result.already_existed);
        assert!(store.has("did:key:alice", "r1", &result.data_cid).await.unwrap());

        let retrieved = store.get("did:key:alice", "r1", &result.data_cid).await.unwrap();
        assert_eq!(retrieved, Some(data));
    }

    #[tokio::test]
    async fn test_idempotent_put_and_tenant_partition() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsDataStore::new(temp_dir.path()).await.unwrap();

        let data = Bytes::from_static(b"Duplicate test");
        let first = store.put("did:key:alice", "r1", data.clone()).await.unwrap();
        let second = store.put("did:key:alice", "r2", data).await.unwrap();
        assert_eq!(first.data_cid, second.data_cid);
        assert!(!first.already_existed);
        assert!(second.already_existed);

        assert!(!store.has("did:key:bob", "r1", &first.data_cid).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsDataStore::new(temp_dir.path()).await.unwrap();

        let a = store.put("t", "r1", Bytes::from_static(b"a")).await.unwrap();
        let b = store.put("t", "r2", Bytes::from_static(b"b")).await.unwrap();

        store.delete("t", "r1", &a.data_cid).await.unwrap();
        store.delete("t", "r1", &a.data_cid).await.unwrap();
        assert!(!store.has("t", "r1", &a.data_cid).await.unwrap());

        store.clear().await.unwrap();
        assert!(store.get("t", "r2", &b.data_cid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corruption_is_detected() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsDataStore::new(temp_dir.path()).await.unwrap();
        let result = store.put("t", "r1", Bytes::from_static(b"original")).await.unwrap();

        let path = store.data_path("t", &result.data_cid).unwrap();
        fs::write(&path, b"tampered").await.unwrap();

        let err = store.get("t", "r1", &result.data_cid).await.unwrap_err();
        assert!(matches!(err, DwnError::DataMismatch(_)));
    }

    #[tokio::test]
    async fn test_rejects_non_cid_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsDataStore::new(temp_dir.path()).await.unwrap();
        assert!(store.has("t", "r1", "../../etc/passwd").await.is_err());
    }
}
