//! Storage backends.
//!
//! Both variants implement [`BlobBackend`]; the rest of the crate only ever sees
//! `Arc<dyn BlobBackend>`, picked once at startup by [`build_backend`].

mod local;
mod s3;

pub use local::LocalFsBackend;
pub use s3::{S3Backend, S3Config};

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};
use tracing::debug;

use crate::{ByteRange, ByteStream, VaultError, VaultResult};

/// Core storage operations - implemented by the filesystem and object-store variants
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Metadata of the object at `path`; `NotFound` when nothing is stored there
    async fn head(&self, path: &str) -> VaultResult<ObjectHead>;

    /// Stream the object, or the inclusive `range` of it
    async fn get(&self, path: &str, range: Option<ByteRange>) -> VaultResult<ByteStream>;

    /// Store `stream` at `path`, replacing whatever was there.
    ///
    /// Readers never observe a partially written object.
    async fn put(
        &self,
        path: &str,
        content_type: Option<&str>,
        stream: ByteStream,
    ) -> VaultResult<u64>;

    /// Remove the object at `path` and return the size it had
    async fn delete(&self, path: &str) -> VaultResult<u64>;

    fn kind(&self) -> BackendKind;

    /// Probe `candidates` in order; the first one that exists wins
    async fn resolve(&self, candidates: &[String]) -> VaultResult<ResolvedObject> {
        let first = candidates.first().map(String::as_str).unwrap_or_default();
        for candidate in candidates {
            match self.head(candidate).await {
                Ok(head) => {
                    debug!("Resolved {} via {}", first, candidate);
                    return Ok(ResolvedObject {
                        path: candidate.clone(),
                        head,
                    });
                }
                Err(VaultError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(VaultError::not_found(first))
    }

    /// Size of the object at `path`, or `None` when absent
    async fn size_of(&self, path: &str) -> VaultResult<Option<u64>> {
        match self.head(path).await {
            Ok(head) => Ok(Some(head.size_bytes)),
            Err(VaultError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn read_all(&self, path: &str) -> VaultResult<Bytes> {
        let stream = self.get(path, None).await?;
        collect(stream).await
    }

    /// Exactly the bytes `start..=end`; a short read is an error
    async fn read_range(&self, path: &str, start: u64, end: u64) -> VaultResult<Bytes> {
        let stream = self.get(path, Some(ByteRange::new(start, end))).await?;
        let bytes = collect(stream).await?;
        let expected = end - start + 1;
        if bytes.len() as u64 != expected {
            return Err(VaultError::backend(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes from {}, got {}", expected, path, bytes.len()),
            )));
        }
        Ok(bytes)
    }
}

/// Which storage substrate a backend talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    LocalFs,
    S3,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalFs => write!(f, "local-fs"),
            Self::S3 => write!(f, "s3"),
        }
    }
}

/// Metadata about a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub content_type: Option<String>,
}

/// A candidate that resolved to an existing object
#[derive(Debug, Clone)]
pub struct ResolvedObject {
    pub path: String,
    pub head: ObjectHead,
}

/// Backend selection, made once at startup
#[derive(Debug, Clone)]
pub enum BackendConfig {
    Local { root: std::path::PathBuf },
    S3(S3Config),
}

pub async fn build_backend(config: &BackendConfig) -> VaultResult<Arc<dyn BlobBackend>> {
    match config {
        BackendConfig::Local { root } => Ok(Arc::new(LocalFsBackend::new(root).await?)),
        BackendConfig::S3(s3) => Ok(Arc::new(S3Backend::new(s3.clone()).await)),
    }
}

async fn collect(stream: ByteStream) -> VaultResult<Bytes> {
    let buf = stream
        .map_err(VaultError::from)
        .try_fold(BytesMut::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await?;
    Ok(buf.freeze())
}

/// Wrap `stream` so that it fails once more than `limit` bytes have gone through
pub(crate) fn limit_stream(stream: ByteStream, limit: u64) -> ByteStream {
    let mut seen: u64 = 0;
    Box::pin(stream.map(move |chunk| {
        let chunk = chunk?;
        seen += chunk.len() as u64;
        if seen > limit {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                TooLargeMarker { limit },
            ));
        }
        Ok(chunk)
    }))
}

/// Wrap `stream` so it errors if it ends before yielding exactly `expected` bytes
pub(crate) fn exact_length(stream: ByteStream, expected: u64) -> ByteStream {
    Box::pin(async_stream::try_stream! {
        let mut stream = stream;
        let mut seen: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            seen += chunk.len() as u64;
            check_overrun(seen, expected)?;
            yield chunk;
        }
        check_complete(seen, expected)?;
    })
}

fn check_overrun(seen: u64, expected: u64) -> std::io::Result<()> {
    if seen > expected {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("backend returned more than {} bytes", expected),
        ));
    }
    Ok(())
}

fn check_complete(seen: u64, expected: u64) -> std::io::Result<()> {
    if seen != expected {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("backend returned {} of {} bytes", seen, expected),
        ));
    }
    Ok(())
}

/// Carried inside an `io::Error` so size-limit violations survive the stream boundary
#[derive(Debug)]
pub(crate) struct TooLargeMarker {
    pub limit: u64,
}

impl std::fmt::Display for TooLargeMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "payload exceeds {} bytes", self.limit)
    }
}

impl std::error::Error for TooLargeMarker {}

/// Turn a stream I/O failure into a `VaultError`, keeping size-limit violations distinct
pub(crate) fn stream_error(err: std::io::Error) -> VaultError {
    let limit = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<TooLargeMarker>())
        .map(|marker| marker.limit);
    match limit {
        Some(limit) => VaultError::TooLarge { limit },
        None => VaultError::from(err),
    }
}
