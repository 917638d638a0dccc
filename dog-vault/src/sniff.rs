//! Content-type detection from leading bytes.

/// Bytes read from the start of an object before matching
pub const SNIFF_LEN: u64 = 8192;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Guess a MIME type from the first bytes of an object
pub fn sniff(head: &[u8]) -> Option<&'static str> {
    infer::get(head).map(|kind| kind.mime_type())
}
