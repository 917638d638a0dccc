//! Local filesystem backend

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{exact_length, stream_error, BackendKind, BlobBackend, ObjectHead};
use crate::{ByteRange, ByteStream, VaultError, VaultResult};

/// Staged uploads live next to the objects so the final rename never crosses filesystems
const TEMP_PREFIX: &str = "tmp_";

const READ_CHUNK: usize = 64 * 1024;

/// Filesystem storage.
///
/// Paths handed to this backend are the sharded paths produced by
/// [`crate::KeyResolver`] and already include the root.
#[derive(Debug, Clone)]
pub struct LocalFsBackend {
    root: PathBuf,
}

impl LocalFsBackend {
    /// Create the backend, creating `root` if needed and sweeping
    /// staged files left behind by an earlier crash.
    pub async fn new(root: impl AsRef<Path>) -> VaultResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;

        let backend = Self { root };
        let swept = backend.sweep_temp_files().await?;
        if swept > 0 {
            info!("Removed {} stale temporary files from {}", swept, backend.root.display());
        }
        Ok(backend)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn sweep_temp_files(&self) -> VaultResult<usize> {
        let mut swept = 0;
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let stale = entry
                .file_name()
                .to_str()
                .map_or(false, |name| name.starts_with(TEMP_PREFIX));
            if stale && entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
                swept += 1;
            }
        }
        Ok(swept)
    }
}

fn missing_as_not_found(path: &str) -> impl FnOnce(std::io::Error) -> VaultError + '_ {
    move |e| match e.kind() {
        std::io::ErrorKind::NotFound => VaultError::not_found(path),
        _ => e.into(),
    }
}

#[async_trait]
impl BlobBackend for LocalFsBackend {
    async fn head(&self, path: &str) -> VaultResult<ObjectHead> {
        let meta = fs::metadata(path).await.map_err(missing_as_not_found(path))?;
        if !meta.is_file() {
            return Err(VaultError::not_found(path));
        }
        Ok(ObjectHead {
            size_bytes: meta.len(),
            content_type: None,
        })
    }

    async fn get(&self, path: &str, range: Option<ByteRange>) -> VaultResult<ByteStream> {
        let mut file = fs::File::open(path).await.map_err(missing_as_not_found(path))?;

        match range {
            None => Ok(Box::pin(ReaderStream::with_capacity(file, READ_CHUNK))),
            Some(range) => {
                file.seek(SeekFrom::Start(range.start)).await?;
                let len = range.len();
                let body = ReaderStream::with_capacity(file.take(len), READ_CHUNK);
                Ok(exact_length(Box::pin(body), len))
            }
        }
    }

    async fn put(
        &self,
        path: &str,
        _content_type: Option<&str>,
        mut stream: ByteStream,
    ) -> VaultResult<u64> {
        let target = Path::new(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut staged = StagedFile::create(&self.root).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(stream_error)?;
            staged.file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        staged.persist(target).await?;
        debug!("Wrote {} bytes to {}", written, path);
        Ok(written)
    }

    async fn delete(&self, path: &str) -> VaultResult<u64> {
        let head = self.head(path).await?;
        fs::remove_file(path).await.map_err(missing_as_not_found(path))?;
        Ok(head.size_bytes)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::LocalFs
    }
}

/// A temporary file under the storage root that is removed on drop unless persisted
struct StagedFile {
    path: PathBuf,
    file: fs::File,
    persisted: bool,
}

impl StagedFile {
    async fn create(root: &Path) -> VaultResult<Self> {
        let path = root.join(format!("{}{}", TEMP_PREFIX, Uuid::new_v4().simple()));
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file,
            persisted: false,
        })
    }

    /// Flush to disk and atomically move into place
    async fn persist(&mut self, target: &Path) -> VaultResult<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        fs::rename(&self.path, target).await?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove temporary file {}: {}", self.path.display(), e);
            }
        }
    }
}
