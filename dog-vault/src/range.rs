//! Byte-range reads.
//!
//! A download starts with no range decided and ends in exactly one of three
//! states: the whole object, an inclusive slice of it, or unsatisfiable
//! ([`VaultError::RangeNotSatisfiable`], which carries the object size so the
//! caller can answer with `Content-Range: bytes */{size}`).

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::{exact_length, BlobBackend};
use crate::sniff::{sniff, DEFAULT_CONTENT_TYPE, SNIFF_LEN};
use crate::{ByteRange, ByteStream, VaultError, VaultResult};

/// Outcome of checking a `Range` header against an object size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    Full,
    Partial(ByteRange),
}

/// Parse a `bytes=<start>-<end>` specifier against an object of `size` bytes.
///
/// A missing or empty header selects the whole object. `end` may be omitted to
/// read through EOF. Anything else that does not name bytes inside the object
/// is unsatisfiable; suffix ranges (`bytes=-N`) and multi-range lists are not
/// supported.
pub fn parse_range(header: Option<&str>, size: u64) -> VaultResult<RangeRequest> {
    let header = match header {
        Some(h) if !h.is_empty() => h,
        _ => return Ok(RangeRequest::Full),
    };
    let unsatisfiable = || VaultError::RangeNotSatisfiable { size };

    let spec = header.strip_prefix("bytes=").unwrap_or(header);
    let parts: Vec<&str> = spec.split('-').collect();
    if parts.len() != 2 {
        return Err(unsatisfiable());
    }

    let start: u64 = parts[0].parse().map_err(|_| unsatisfiable())?;
    let end: u64 = if parts[1].is_empty() {
        size.checked_sub(1).ok_or_else(unsatisfiable)?
    } else {
        parts[1].parse().map_err(|_| unsatisfiable())?
    };

    if start >= size || end >= size || start > end {
        return Err(unsatisfiable());
    }
    Ok(RangeRequest::Partial(ByteRange::new(start, end)))
}

/// `Content-Range` value for a 416 answer
pub fn unsatisfiable_content_range(size: u64) -> String {
    format!("bytes */{}", size)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// HTTP 200
    Full,
    /// HTTP 206
    Partial,
}

/// A resolved object ready to be streamed to a client
pub struct Download {
    pub status: DownloadStatus,
    /// Candidate path that actually held the object
    pub path: String,
    pub content_type: String,
    pub content_length: u64,
    pub total_size: u64,
    pub range: Option<ByteRange>,
    pub stream: ByteStream,
}

impl Download {
    /// `Content-Range` value for partial responses
    pub fn content_range(&self) -> Option<String> {
        self.range
            .map(|r| format!("bytes {}-{}/{}", r.start, r.end, self.total_size))
    }

    pub fn is_partial(&self) -> bool {
        self.status == DownloadStatus::Partial
    }
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("status", &self.status)
            .field("path", &self.path)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("total_size", &self.total_size)
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

/// Drives a backend to serve whole objects or byte ranges
#[derive(Clone)]
pub struct RangeServer {
    backend: Arc<dyn BlobBackend>,
}

impl RangeServer {
    pub fn new(backend: Arc<dyn BlobBackend>) -> Self {
        Self { backend }
    }

    /// Resolve `candidates`, validate `range_header` and open the matching stream
    pub async fn serve(&self, candidates: &[String], range_header: Option<&str>) -> VaultResult<Download> {
        let resolved = self.backend.resolve(candidates).await?;
        let total_size = resolved.head.size_bytes;
        let request = parse_range(range_header, total_size)?;

        let content_type = match resolved.head.content_type.clone() {
            Some(ct) => ct,
            None => self.sniff_content_type(&resolved.path, total_size).await,
        };

        let download = match request {
            RangeRequest::Full => Download {
                status: DownloadStatus::Full,
                // The object may be replaced between `resolve` and `get`
                stream: exact_length(self.backend.get(&resolved.path, None).await?, total_size),
                path: resolved.path,
                content_type,
                content_length: total_size,
                total_size,
                range: None,
            },
            RangeRequest::Partial(range) => Download {
                status: DownloadStatus::Partial,
                stream: self.backend.get(&resolved.path, Some(range)).await?,
                path: resolved.path,
                content_type,
                content_length: range.len(),
                total_size,
                range: Some(range),
            },
        };

        debug!(
            "Serving {} ({:?}, {} of {} bytes)",
            download.path, download.status, download.content_length, download.total_size
        );
        Ok(download)
    }

    async fn sniff_content_type(&self, path: &str, size: u64) -> String {
        if size == 0 {
            return DEFAULT_CONTENT_TYPE.to_string();
        }
        match self.backend.read_range(path, 0, size.min(SNIFF_LEN) - 1).await {
            Ok(head) => sniff(&head).unwrap_or(DEFAULT_CONTENT_TYPE).to_string(),
            Err(e) => {
                warn!("Could not sniff content type of {}: {}", path, e);
                DEFAULT_CONTENT_TYPE.to_string()
            }
        }
    }
}
