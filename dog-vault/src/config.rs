use std::path::PathBuf;
use std::time::Duration;

use crate::backend::{BackendConfig, S3Config};

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Upload cap for the filesystem backend, which streams to disk
pub const LOCAL_MAX_UPLOAD_BYTES: u64 = 5 * GIB;

/// Upload cap for the object store, which holds a body in memory for `PutObject`
pub const S3_MAX_UPLOAD_BYTES: u64 = 512 * MIB;

/// Configuration for a [`crate::BlobVault`]
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Root of the sharded layout: a directory for the filesystem backend,
    /// a key prefix for the object store
    pub storage_root: String,

    /// Where the usage total is persisted
    pub usage_path: PathBuf,

    pub backend: BackendConfig,

    pub fetch_timeout: Duration,

    /// Largest body accepted by ingestion
    pub max_ingest_bytes: u64,

    /// Largest body accepted by upload; `None` uses the backend's default
    pub max_upload_bytes: Option<u64>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            storage_root: "./storage".to_string(),
            usage_path: PathBuf::from("./usage.json"),
            backend: BackendConfig::Local {
                root: PathBuf::from("./storage"),
            },
            fetch_timeout: Duration::from_secs(30),
            max_ingest_bytes: GIB,
            max_upload_bytes: None,
        }
    }
}

impl VaultConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filesystem storage rooted at `root`
    pub fn local<S: Into<String>>(root: S) -> Self {
        Self::default().with_storage_root(root)
    }

    /// Set the storage root; a filesystem backend follows it
    pub fn with_storage_root<S: Into<String>>(mut self, root: S) -> Self {
        self.storage_root = root.into();
        if let BackendConfig::Local { root } = &mut self.backend {
            *root = PathBuf::from(&self.storage_root);
        }
        self
    }

    pub fn with_usage_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.usage_path = path.into();
        self
    }

    pub fn with_s3(mut self, s3: S3Config) -> Self {
        self.backend = BackendConfig::S3(s3);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_max_ingest_bytes(mut self, limit: u64) -> Self {
        self.max_ingest_bytes = limit;
        self
    }

    pub fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = Some(limit);
        self
    }

    /// Effective upload cap: the explicit limit, else the backend default
    pub fn upload_limit(&self) -> u64 {
        self.max_upload_bytes.unwrap_or(match self.backend {
            BackendConfig::Local { .. } => LOCAL_MAX_UPLOAD_BYTES,
            BackendConfig::S3(_) => S3_MAX_UPLOAD_BYTES,
        })
    }

    /// Read the configuration from the process environment.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut config = Self::default()
            .with_storage_root(env_var_or("STORAGE_PATH", defaults.storage_root.clone()))
            .with_usage_path(env_var_or("USAGE_PATH", defaults.usage_path.display().to_string()))
            .with_fetch_timeout(Duration::from_secs(env_var_or(
                "FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout.as_secs(),
            )))
            .with_max_ingest_bytes(env_var_or("MAX_INGEST_BYTES", defaults.max_ingest_bytes));

        if let Some(limit) = std::env::var("MAX_UPLOAD_BYTES").ok().and_then(|v| v.parse().ok()) {
            config = config.with_max_upload_bytes(limit);
        }

        if env_flag("S3", false) {
            let mut s3 = S3Config::new(env_var_or("S3_BUCKET", "viespirkiai".to_string()))
                .with_region(env_var_or("S3_REGION", "us-east-1".to_string()))
                .with_credentials(
                    env_var_or("S3_ACCESS_KEY", String::new()),
                    env_var_or("S3_SECRET_KEY", String::new()),
                );
            if let Some(endpoint) = std::env::var("S3_ENDPOINT").ok().filter(|e| !e.is_empty()) {
                s3 = s3.with_endpoint(endpoint);
            }
            config = config.with_s3(s3);
        }

        config
    }
}

/// Parse `key` from the environment, falling back to `default`
pub fn env_var_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
    T::Err: std::fmt::Debug,
{
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or(default)
}

/// Boolean environment switch; accepts `true/false`, `1/0`, `yes/no`, `on/off`
pub fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_flag(&v))
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
