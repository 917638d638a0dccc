//! # dog-vault: sharded content store for DogRS services
//!
//! `dog-vault` stores opaque blobs under client-chosen keys, serves them back
//! whole or by byte range, and keeps a durable running total of the bytes it
//! holds.
//!
//! ## Key Features
//!
//! - **Sharded layout**: `{root}/{first two chars}/{key}` keeps directories small
//! - **Tolerant lookups**: reads and deletes try `.jpg`/`.jpeg`, extensionless, `.bin` and `.php` variants
//! - **Two backends, one contract**: local filesystem or any S3-compatible store, chosen at startup
//! - **Range reads**: single `bytes=start-end` ranges with exact `Content-Range` bookkeeping
//! - **Consistent accounting**: every mutation applies a size delta under one lock and persists it
//! - **Remote ingestion**: fetch a URL and store it content-addressed by MD5
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dog_vault::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> VaultResult<()> {
//! let vault = BlobVault::connect(VaultConfig::local("./storage")).await?;
//!
//! let receipt = vault.upload("hello.txt", bytes_stream("Hello, world!"), Some("text/plain")).await?;
//! assert_eq!(receipt.new_size, 13);
//!
//! let download = vault.open("hello.txt", Some("bytes=0-4")).await?;
//! assert_eq!(download.content_range().as_deref(), Some("bytes 0-4/13"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   HTTP layer    │  ← auth, routing, status codes
//! ├─────────────────┤
//! │    BlobVault    │  ← keys, locks, ranges, usage ledger
//! ├─────────────────┤
//! │   BlobBackend   │  ← filesystem or S3 primitives
//! └─────────────────┘
//! ```

pub mod backend;
mod config;
mod error;
mod ingest;
pub mod keys;
mod locks;
pub mod range;
pub mod sniff;
mod types;
mod usage;
mod vault;

// Re-export main types for clean API
pub use backend::{
    build_backend, BackendConfig, BackendKind, BlobBackend, LocalFsBackend, ObjectHead, ResolvedObject,
    S3Backend, S3Config,
};
pub use config::{env_flag, env_var_or, VaultConfig, LOCAL_MAX_UPLOAD_BYTES, S3_MAX_UPLOAD_BYTES};
pub use error::{LedgerPersistError, VaultError, VaultResult};
pub use ingest::{FetchedObject, Ingestor};
pub use keys::KeyResolver;
pub use locks::KeyLocks;
pub use range::{parse_range, unsatisfiable_content_range, Download, DownloadStatus, RangeRequest, RangeServer};
pub use types::{bytes_stream, ByteRange, ByteStream};
pub use usage::UsageLedger;
pub use vault::{BlobVault, DeleteReceipt, IngestReceipt, UploadReceipt, UsageReport};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        bytes_stream, BlobBackend, BlobVault, ByteStream, Download, VaultConfig, VaultError, VaultResult,
    };
}
