use std::time::Duration;

use dog_vault::{BlobVault, VaultConfig, VaultError};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

fn config(temp: &TempDir) -> VaultConfig {
    VaultConfig::local(temp.path().join("storage").display().to_string())
        .with_usage_path(temp.path().join("usage.json"))
        .with_fetch_timeout(Duration::from_millis(500))
        .with_max_ingest_bytes(64)
}

#[tokio::test]
async fn ingest_stores_under_md5() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hello.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes("hello"))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let vault = BlobVault::connect(config(&temp)).await.unwrap();

    let receipt = vault.ingest(&format!("{}/hello.txt", server.uri())).await.unwrap();
    assert_eq!(receipt.md5, HELLO_MD5);
    assert_eq!(receipt.size, 5);
    assert_eq!(vault.usage().total_size_bytes, 5);
    assert!(temp.path().join("storage/5d").join(HELLO_MD5).is_file());
}

#[tokio::test]
async fn ingesting_same_content_twice_counts_once() {
    let server = MockServer::start().await;
    for route in ["/a", "/b"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_bytes("hello"))
            .mount(&server)
            .await;
    }

    let temp = TempDir::new().unwrap();
    let vault = BlobVault::connect(config(&temp)).await.unwrap();

    let first = vault.ingest(&format!("{}/a", server.uri())).await.unwrap();
    let second = vault.ingest(&format!("{}/b", server.uri())).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(vault.usage().total_size_bytes, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ingest_of_same_content_counts_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes("hello"))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let vault = BlobVault::connect(config(&temp)).await.unwrap();

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let vault = vault.clone();
            let url = format!("{}/copy-{i}", server.uri());
            tokio::spawn(async move { vault.ingest(&url).await.unwrap() })
        })
        .collect();
    for task in tasks {
        let receipt = task.await.unwrap();
        assert_eq!(receipt.md5, HELLO_MD5);
        assert_eq!(receipt.size, 5);
    }

    assert_eq!(vault.usage().total_size_bytes, 5);
    let raw = std::fs::read_to_string(temp.path().join("usage.json")).unwrap();
    assert_eq!(raw, r#"{"totalSize":5}"#);
}

#[tokio::test]
async fn upstream_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let vault = BlobVault::connect(config(&temp)).await.unwrap();

    match vault.ingest(&format!("{}/missing", server.uri())).await {
        Err(VaultError::FetchStatus { status, .. }) => assert_eq!(status, 404),
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(vault.usage().total_size_bytes, 0);
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes("late")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let vault = BlobVault::connect(config(&temp)).await.unwrap();

    let err = vault.ingest(&format!("{}/slow", server.uri())).await.unwrap_err();
    assert!(matches!(err, VaultError::FetchTimeout { .. }), "{err:?}");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 65]))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let vault = BlobVault::connect(config(&temp)).await.unwrap();

    let err = vault.ingest(&format!("{}/big", server.uri())).await.unwrap_err();
    assert!(matches!(err, VaultError::TooLarge { limit: 64 }));
    assert_eq!(vault.usage().total_size_bytes, 0);
}

#[tokio::test]
async fn missing_url_is_invalid() {
    let temp = TempDir::new().unwrap();
    let vault = BlobVault::connect(config(&temp)).await.unwrap();
    assert!(matches!(vault.ingest("").await, Err(VaultError::Invalid { .. })));
}
