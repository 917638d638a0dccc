//! Remote ingestion: pull a URL into memory and name it by content.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use reqwest::{Client, Url};
use tracing::debug;

use crate::{VaultError, VaultResult};

/// A fetched body, addressed by the lowercase hex MD5 of its bytes
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub md5: String,
    pub data: Bytes,
    /// `Content-Type` reported by the remote server, if any
    pub content_type: Option<String>,
}

impl FetchedObject {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// HTTP fetcher with a request timeout and a body size cap
#[derive(Debug, Clone)]
pub struct Ingestor {
    client: Client,
    max_bytes: u64,
}

impl Ingestor {
    pub fn new(timeout: Duration, max_bytes: u64) -> VaultResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(VaultError::backend)?;
        Ok(Self { client, max_bytes })
    }

    pub fn with_client(client: Client, max_bytes: u64) -> Self {
        Self { client, max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// GET `url` and hash the body as it arrives.
    ///
    /// Only `http` and `https` URLs are accepted. A non-2xx answer is
    /// [`VaultError::FetchStatus`]; a body larger than the cap is
    /// [`VaultError::TooLarge`].
    pub async fn fetch(&self, url: &str) -> VaultResult<FetchedObject> {
        let parsed = parse_url(url)?;

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| fetch_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VaultError::FetchStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(VaultError::TooLarge { limit: self.max_bytes });
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let mut digest = md5::Context::new();
        let mut data = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| fetch_error(url, e))? {
            if (data.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(VaultError::TooLarge { limit: self.max_bytes });
            }
            digest.consume(&chunk);
            data.extend_from_slice(&chunk);
        }

        let md5 = format!("{:x}", digest.compute());
        debug!("Fetched {} bytes from {} (md5 {})", data.len(), url, md5);

        Ok(FetchedObject {
            md5,
            data: data.freeze(),
            content_type,
        })
    }
}

fn parse_url(url: &str) -> VaultResult<Url> {
    if url.trim().is_empty() {
        return Err(VaultError::invalid("Missing url field"));
    }
    let parsed = Url::parse(url).map_err(|e| VaultError::invalid(format!("Invalid url {url:?}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(VaultError::invalid(format!("Unsupported url scheme: {other}"))),
    }
}

fn fetch_error(url: &str, source: reqwest::Error) -> VaultError {
    if source.is_timeout() {
        VaultError::FetchTimeout { url: url.to_string() }
    } else {
        VaultError::Fetch {
            url: url.to_string(),
            source,
        }
    }
}
