use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream as AwsByteStream, Client};
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{exact_length, stream_error, BackendKind, BlobBackend, ObjectHead};
use crate::{ByteRange, ByteStream, VaultError, VaultResult};

const READ_CHUNK: usize = 64 * 1024;

/// Content types object stores report when none was set on upload
const PLACEHOLDER_TYPES: &[&str] = &["binary/octet-stream", "application/octet-stream"];

/// Connection settings for an S3-compatible object store
#[derive(Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint (MinIO, RustFS, Ceph...). Enables path-style addressing.
    pub endpoint_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl S3Config {
    pub fn new<S: Into<String>>(bucket: S) -> Self {
        Self {
            bucket: bucket.into(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
            access_key_id: String::new(),
            secret_access_key: String::new(),
        }
    }

    pub fn with_region<S: Into<String>>(mut self, region: S) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_endpoint<S: Into<String>>(mut self, endpoint_url: S) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    pub fn with_credentials<A: Into<String>, S: Into<String>>(mut self, access_key_id: A, secret_access_key: S) -> Self {
        self.access_key_id = access_key_id.into();
        self.secret_access_key = secret_access_key.into();
        self
    }

    fn has_static_credentials(&self) -> bool {
        !self.access_key_id.is_empty() && !self.secret_access_key.is_empty()
    }
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Object-store backend using the AWS SDK.
///
/// Sharded paths are used verbatim as object keys; S3's whole-object replace
/// on `PutObject` provides the no-partial-write guarantee.
#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    pub async fn new(config: S3Config) -> Self {
        let bucket = config.bucket.clone();
        let client = Self::create_client(config).await;
        Self { client, bucket }
    }

    /// Use an already configured client
    pub fn with_client(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn create_client(config: S3Config) -> Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        if config.has_static_credentials() {
            let credentials = Credentials::new(
                config.access_key_id.clone(),
                config.secret_access_key.clone(),
                None,
                None,
                "dog-vault",
            );
            loader = loader.credentials_provider(credentials);
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let aws_config = loader.load().await;
        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(config.endpoint_url.is_some())
                .build(),
        )
    }

    async fn collect_stream(mut stream: ByteStream) -> VaultResult<Vec<u8>> {
        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(stream_error)?;
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }

    fn format_range(range: &ByteRange) -> String {
        format!("bytes={}-{}", range.start, range.end)
    }

    fn map_aws_error(err: impl std::error::Error + Send + Sync + 'static) -> VaultError {
        VaultError::backend(err)
    }
}

#[async_trait]
impl BlobBackend for S3Backend {
    async fn head(&self, path: &str) -> VaultResult<ObjectHead> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await;

        match result {
            Ok(output) => {
                let content_type = output
                    .content_type()
                    .filter(|ct| !ct.is_empty() && !PLACEHOLDER_TYPES.contains(ct))
                    .map(str::to_string);
                Ok(ObjectHead {
                    size_bytes: output.content_length().unwrap_or(0).max(0) as u64,
                    content_type,
                })
            }
            Err(err) if err.as_service_error().map_or(false, |e| e.is_not_found()) => {
                Err(VaultError::not_found(path))
            }
            Err(err) => Err(Self::map_aws_error(err)),
        }
    }

    async fn get(&self, path: &str, range: Option<ByteRange>) -> VaultResult<ByteStream> {
        let mut request = self.client.get_object().bucket(&self.bucket).key(path);
        if let Some(ref range) = range {
            request = request.range(Self::format_range(range));
        }

        let output = request.send().await.map_err(|err| {
            if err.as_service_error().map_or(false, |e| e.is_no_such_key()) {
                VaultError::not_found(path)
            } else {
                Self::map_aws_error(err)
            }
        })?;

        let body = ReaderStream::with_capacity(output.body.into_async_read(), READ_CHUNK);
        match range {
            Some(range) => Ok(exact_length(Box::pin(body), range.len())),
            None => Ok(Box::pin(body)),
        }
    }

    async fn put(
        &self,
        path: &str,
        content_type: Option<&str>,
        stream: ByteStream,
    ) -> VaultResult<u64> {
        let data = Self::collect_stream(stream).await?;
        let size = data.len() as u64;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(AwsByteStream::from(data));

        if let Some(ct) = content_type.filter(|ct| !ct.is_empty()) {
            request = request.content_type(ct);
        }

        request.send().await.map_err(Self::map_aws_error)?;
        debug!("Put {} bytes to s3://{}/{}", size, self.bucket, path);
        Ok(size)
    }

    async fn delete(&self, path: &str) -> VaultResult<u64> {
        let head = self.head(path).await?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        Ok(head.size_bytes)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::S3
    }
}
