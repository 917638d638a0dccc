//! Running total of stored bytes.
//!
//! The total is a counter, not an aggregate: every accepted mutation applies a
//! delta and the new value is written to a small JSON record
//! (`{"totalSize": n}`) before `apply` returns. All deltas pass through one
//! async mutex that stays held for the whole read-modify-write-persist
//! sequence, so concurrent handlers never lose an update.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{LedgerPersistError, VaultError, VaultResult};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageRecord {
    total_size: i64,
}

/// Process-wide usage counter backed by a durable record
#[derive(Debug)]
pub struct UsageLedger {
    path: PathBuf,
    total: AtomicI64,
    sequencer: Mutex<()>,
}

impl UsageLedger {
    /// Load the persisted total from `path`.
    ///
    /// A missing record starts the ledger at zero; a record that exists but
    /// cannot be parsed is an error.
    pub async fn load(path: impl AsRef<Path>) -> VaultResult<Self> {
        let path = path.as_ref().to_path_buf();
        let total = match fs::read(&path).await {
            Ok(data) => {
                let record: UsageRecord =
                    serde_json::from_slice(&data).map_err(|source| VaultError::CorruptLedger {
                        path: path.display().to_string(),
                        source,
                    })?;
                record.total_size
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No usage record at {}, starting from zero", path.display());
                0
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            total: AtomicI64::new(total),
            sequencer: Mutex::new(()),
        })
    }

    /// In-memory total; no I/O
    pub fn current(&self) -> i64 {
        self.total.load(Ordering::Acquire)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add `delta` (may be negative) and persist the new total.
    ///
    /// The in-memory total moves even when persisting fails; the error carries
    /// the new total and the durable copy catches up on the next successful call.
    pub async fn apply(&self, delta: i64) -> Result<i64, LedgerPersistError> {
        let _guard = self.sequencer.lock().await;

        let total = self.current().saturating_add(delta);
        self.total.store(total, Ordering::Release);

        self.persist(total)
            .await
            .map_err(|source| LedgerPersistError { total, source })?;

        debug!("Usage {:+} -> {}", delta, total);
        Ok(total)
    }

    /// Block every `apply` until the guard drops
    #[cfg(test)]
    pub(crate) async fn hold(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.sequencer.lock().await
    }

    /// Write-then-rename so a crash never leaves a half-written record behind
    async fn persist(&self, total: i64) -> std::io::Result<()> {
        let data = serde_json::to_vec(&UsageRecord { total_size: total })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        fs::write(&staging, &data).await?;
        fs::rename(&staging, &self.path).await
    }
}
