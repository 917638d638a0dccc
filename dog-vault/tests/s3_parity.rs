//! Runs the same scenarios against the filesystem and a live S3-compatible
//! endpoint. Enable with `--features s3-tests` and the usual `S3_*` variables.
#![cfg(feature = "s3-tests")]

use std::sync::Arc;

use bytes::Bytes;
use dog_vault::{
    build_backend, bytes_stream, BackendConfig, BlobBackend, ByteRange, KeyResolver, S3Config, VaultConfig,
    VaultError,
};
use futures::TryStreamExt;
use tempfile::TempDir;
use uuid::Uuid;

fn s3_config() -> S3Config {
    match VaultConfig::from_env().backend {
        BackendConfig::S3(s3) => s3,
        BackendConfig::Local { .. } => {
            let mut s3 = S3Config::new(dog_vault::env_var_or("S3_BUCKET", "viespirkiai".to_string()));
            if let Ok(endpoint) = std::env::var("S3_ENDPOINT") {
                s3 = s3.with_endpoint(endpoint);
            }
            s3.with_credentials(
                dog_vault::env_var_or("S3_ACCESS_KEY", String::new()),
                dog_vault::env_var_or("S3_SECRET_KEY", String::new()),
            )
        }
    }
}

async fn backends(temp: &TempDir) -> Vec<(Arc<dyn BlobBackend>, KeyResolver)> {
    let local_root = temp.path().join("storage");
    let local = build_backend(&BackendConfig::Local { root: local_root.clone() }).await.unwrap();
    let s3 = build_backend(&BackendConfig::S3(s3_config())).await.unwrap();

    vec![
        (local, KeyResolver::new(local_root.display().to_string())),
        (s3, KeyResolver::new(format!("parity-{}", Uuid::new_v4().simple()))),
    ]
}

async fn read(backend: &Arc<dyn BlobBackend>, path: &str, range: Option<ByteRange>) -> Bytes {
    let chunks: Vec<Bytes> = backend.get(path, range).await.unwrap().try_collect().await.unwrap();
    chunks.concat().into()
}

#[tokio::test]
async fn put_get_range_delete_agree() {
    let temp = TempDir::new().unwrap();
    for (backend, keys) in backends(&temp).await {
        let path = keys.sharded_path("parity.bin").unwrap();

        assert_eq!(backend.put(&path, None, bytes_stream("0123456789")).await.unwrap(), 10);
        assert_eq!(backend.head(&path).await.unwrap().size_bytes, 10, "{}", backend.kind());
        assert_eq!(read(&backend, &path, None).await, Bytes::from_static(b"0123456789"));
        assert_eq!(read(&backend, &path, Some(ByteRange::new(3, 5))).await, Bytes::from_static(b"345"));

        assert_eq!(backend.delete(&path).await.unwrap(), 10);
        assert!(matches!(backend.head(&path).await, Err(VaultError::NotFound { .. })));
    }
}

#[tokio::test]
async fn candidate_resolution_agrees() {
    let temp = TempDir::new().unwrap();
    for (backend, keys) in backends(&temp).await {
        let stored = keys.sharded_path("photo.jpg").unwrap();
        backend.put(&stored, Some("image/jpeg"), bytes_stream("jpg")).await.unwrap();

        let resolved = backend.resolve(&keys.candidates_for("photo.jpeg").unwrap()).await.unwrap();
        assert_eq!(resolved.path, stored, "{}", backend.kind());

        backend.delete(&stored).await.unwrap();
        assert!(matches!(
            backend.resolve(&keys.candidates_for("photo.jpeg").unwrap()).await,
            Err(VaultError::NotFound { .. })
        ));
    }
}
