use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// Stream of bytes for object content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Inclusive byte range, already validated against the object size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered (`end - start + 1`)
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Build a [`ByteStream`] from an in-memory buffer
pub fn bytes_stream<B: Into<Bytes>>(data: B) -> ByteStream {
    let data: Bytes = data.into();
    Box::pin(futures::stream::once(async move { Ok(data) }))
}
