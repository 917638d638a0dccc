use thiserror::Error;

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors that can occur during vault operations
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Invalid key: {key:?}")]
    InvalidKey { key: String },

    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("Payload exceeds limit of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("File not found: {key}")]
    NotFound { key: String },

    #[error("Range not satisfiable for object of {size} bytes")]
    RangeNotSatisfiable { size: u64 },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to fetch {url}: {status}")]
    FetchStatus { url: String, status: u16 },

    #[error("Timed out fetching {url}")]
    FetchTimeout { url: String },

    #[error("Usage record {path} is corrupt: {source}")]
    CorruptLedger {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl VaultError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(key: S) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn invalid_key<S: Into<String>>(key: S) -> Self {
        Self::InvalidKey { key: key.into() }
    }

    /// True for errors caused by the caller's input rather than storage or network
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidKey { .. }
                | Self::Invalid { .. }
                | Self::TooLarge { .. }
                | Self::NotFound { .. }
                | Self::RangeNotSatisfiable { .. }
        )
    }
}

/// Raised when the in-memory usage total moved but the durable record could not be rewritten.
///
/// Non-fatal: `total` is the authoritative value for the rest of the process lifetime.
#[derive(Error, Debug)]
#[error("Failed to persist usage total {total}: {source}")]
pub struct LedgerPersistError {
    pub total: i64,
    #[source]
    pub source: std::io::Error,
}
