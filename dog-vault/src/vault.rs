//! The `BlobVault` facade: one storage backend, the sharded key layout and the
//! usage ledger wired together behind the five operations the HTTP layer calls.
//!
//! Every mutation follows the same order: resolve the path, take the path's
//! lock, probe, mutate the backend, then apply the size delta to the ledger.
//! A failed mutation never reaches the ledger. The locked part runs on its
//! own task, so a caller that goes away mid-request cannot leave storage
//! changed and the ledger behind.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::backend::{build_backend, limit_stream, BlobBackend};
use crate::keys::{file_name, KeyResolver};
use crate::locks::KeyLocks;
use crate::range::{Download, RangeServer};
use crate::{
    bytes_stream, ByteStream, FetchedObject, Ingestor, LedgerPersistError, UsageLedger, VaultConfig, VaultError,
    VaultResult,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub uploaded: String,
    pub replaced: bool,
    pub old_size: u64,
    pub new_size: u64,
    pub total_size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReceipt {
    /// File name of the path that actually held the object
    pub deleted: String,
    pub size_freed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReceipt {
    pub md5: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub total_size_bytes: i64,
}

/// Content store facade
#[derive(Clone)]
pub struct BlobVault {
    backend: Arc<dyn BlobBackend>,
    resolver: KeyResolver,
    ledger: Arc<UsageLedger>,
    locks: Arc<KeyLocks>,
    ranges: RangeServer,
    ingestor: Ingestor,
    max_upload_bytes: u64,
}

impl BlobVault {
    /// Build the backend and load the usage ledger described by `config`
    pub async fn connect(config: VaultConfig) -> VaultResult<Self> {
        let backend = build_backend(&config.backend).await?;
        let ledger = UsageLedger::load(&config.usage_path).await?;
        let ingestor = Ingestor::new(config.fetch_timeout, config.max_ingest_bytes)?;

        info!(
            "Vault ready: backend={} root={} usage={} bytes",
            backend.kind(),
            config.storage_root,
            ledger.current()
        );

        let max_upload_bytes = config.upload_limit();
        Ok(Self::from_parts(
            backend,
            KeyResolver::new(config.storage_root),
            Arc::new(ledger),
            ingestor,
            max_upload_bytes,
        ))
    }

    pub fn from_parts(
        backend: Arc<dyn BlobBackend>,
        resolver: KeyResolver,
        ledger: Arc<UsageLedger>,
        ingestor: Ingestor,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            ranges: RangeServer::new(Arc::clone(&backend)),
            backend,
            resolver,
            ledger,
            locks: Arc::new(KeyLocks::new()),
            ingestor,
            max_upload_bytes,
        }
    }

    pub fn backend(&self) -> &Arc<dyn BlobBackend> {
        &self.backend
    }

    pub fn resolver(&self) -> &KeyResolver {
        &self.resolver
    }

    pub fn ledger(&self) -> &Arc<UsageLedger> {
        &self.ledger
    }

    /// Store `stream` under `key`, replacing any object at the exact sharded path
    pub async fn upload(
        &self,
        key: &str,
        stream: ByteStream,
        content_type: Option<&str>,
    ) -> VaultResult<UploadReceipt> {
        let path = self.resolver.sharded_path(key)?;
        let vault = self.clone();
        let key = key.to_string();
        let content_type = content_type.map(str::to_string);
        detached(async move { vault.store(key, path, stream, content_type).await }).await
    }

    async fn store(
        &self,
        key: String,
        path: String,
        stream: ByteStream,
        content_type: Option<String>,
    ) -> VaultResult<UploadReceipt> {
        let _guard = self.locks.lock(&path).await;

        let old = self.backend.size_of(&path).await?;
        let body = limit_stream(stream, self.max_upload_bytes);
        let new_size = self.backend.put(&path, content_type.as_deref(), body).await?;

        let old_size = old.unwrap_or(0);
        let total_size = self.account(new_size as i64 - old_size as i64).await;

        info!(
            "Uploaded {} ({} bytes, replaced {} bytes), total {}",
            key, new_size, old_size, total_size
        );
        Ok(UploadReceipt {
            uploaded: key,
            replaced: old.is_some(),
            old_size,
            new_size,
            total_size,
        })
    }

    /// Resolve `key` through its candidates and open it, honoring an optional `Range` header
    pub async fn open(&self, key: &str, range_header: Option<&str>) -> VaultResult<Download> {
        let candidates = self.resolver.candidates_for(key)?;
        self.ranges.serve(&candidates, range_header).await
    }

    /// Delete the first candidate of `key` that exists
    pub async fn delete(&self, key: &str) -> VaultResult<DeleteReceipt> {
        let candidates = self.resolver.candidates_for(key)?;
        let vault = self.clone();
        detached(async move { vault.remove(candidates).await }).await
    }

    async fn remove(&self, candidates: Vec<String>) -> VaultResult<DeleteReceipt> {
        let resolved = self.backend.resolve(&candidates).await?;

        // Locks are per physical path; the backend re-checks existence under it
        let _guard = self.locks.lock(&resolved.path).await;
        let size_freed = self.backend.delete(&resolved.path).await?;
        let total_size = self.account(-(size_freed as i64)).await;

        info!("Deleted {} ({} bytes freed), total {}", resolved.path, size_freed, total_size);
        Ok(DeleteReceipt {
            deleted: file_name(&resolved.path).to_string(),
            size_freed,
        })
    }

    /// Fetch `url` and store it under the MD5 of its body.
    ///
    /// Content that is already stored is not written again and leaves the
    /// usage total untouched.
    pub async fn ingest(&self, url: &str) -> VaultResult<IngestReceipt> {
        let fetched = self.ingestor.fetch(url).await?;
        let path = self.resolver.sharded_path(&fetched.md5)?;
        let vault = self.clone();
        let url = url.to_string();
        detached(async move { vault.keep(url, path, fetched).await }).await
    }

    async fn keep(&self, url: String, path: String, fetched: FetchedObject) -> VaultResult<IngestReceipt> {
        let _guard = self.locks.lock(&path).await;

        if let Some(existing) = self.backend.size_of(&path).await? {
            info!("Ingest of {} matched existing {}", url, fetched.md5);
            return Ok(IngestReceipt {
                md5: fetched.md5,
                size: existing,
            });
        }

        let size = self
            .backend
            .put(&path, fetched.content_type.as_deref(), bytes_stream(fetched.data))
            .await?;
        let total_size = self.account(size as i64).await;

        info!("Ingested {} as {} ({} bytes), total {}", url, fetched.md5, size, total_size);
        Ok(IngestReceipt {
            md5: fetched.md5,
            size,
        })
    }

    pub fn usage(&self) -> UsageReport {
        UsageReport {
            total_size_bytes: self.ledger.current(),
        }
    }

    /// Apply `delta` to the ledger; a persist failure is logged and the in-memory total stands
    async fn account(&self, delta: i64) -> i64 {
        match self.ledger.apply(delta).await {
            Ok(total) => total,
            Err(LedgerPersistError { total, source }) => {
                warn!(
                    "Usage total {} not persisted to {}: {}",
                    total,
                    self.ledger.path().display(),
                    source
                );
                total
            }
        }
    }
}

impl std::fmt::Debug for BlobVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobVault")
            .field("backend", &self.backend.kind())
            .field("root", &self.resolver.root())
            .field("usage", &self.ledger.current())
            .finish_non_exhaustive()
    }
}

/// Run a locked mutation on its own task so it reaches the ledger even when
/// the caller stops polling halfway through
async fn detached<T, F>(task: F) -> VaultResult<T>
where
    F: Future<Output = VaultResult<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(task).await.map_err(VaultError::backend)?
}
