use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use dog_vault::{BlobVault, VaultConfig};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use vault_server::{AuthConfig, VaultApp};

const KEY: &str = "test-key";

async fn app(temp: &TempDir) -> Router {
    let config = VaultConfig::local(temp.path().join("storage").display().to_string())
        .with_usage_path(temp.path().join("usage.json"));
    let vault = BlobVault::connect(config).await.unwrap();
    VaultApp::new(vault, AuthConfig::require(KEY)).router
}

fn request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri).header("x-api-key", KEY)
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn put(router: &Router, name: &str, data: &'static [u8]) -> Value {
    let res = router
        .clone()
        .oneshot(request("PUT", &format!("/file/{name}")).body(Body::from(data)).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    json_body(res).await
}

#[tokio::test]
async fn health_needs_no_key() {
    let temp = TempDir::new().unwrap();
    let router = app(&temp).await;

    let res = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("x-request-id").is_some());
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(std::str::from_utf8(&bytes).unwrap(), "ok");
}

#[tokio::test]
async fn wrong_or_missing_key_is_forbidden() {
    let temp = TempDir::new().unwrap();
    let router = app(&temp).await;

    let missing = router
        .clone()
        .oneshot(Request::builder().uri("/storage-usage").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(missing).await, json!({"error": "Forbidden"}));

    let wrong = router
        .oneshot(
            Request::builder()
                .uri("/storage-usage")
                .header("x-api-key", "nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn upload_replace_and_delete_report_sizes() {
    let temp = TempDir::new().unwrap();
    let router = app(&temp).await;

    let first = put(&router, "report.pdf", b"%PDF-1.4 first").await;
    assert_eq!(
        first,
        json!({"uploaded": "report.pdf", "replaced": false, "oldSize": 0, "newSize": 14, "totalSize": 14})
    );

    let second = put(&router, "report.pdf", b"%PDF-1.4").await;
    assert_eq!(second["replaced"], true);
    assert_eq!(second["oldSize"], 14);
    assert_eq!(second["totalSize"], 8);

    let res = router
        .clone()
        .oneshot(request("DELETE", "/file/report.pdf").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, json!({"deleted": "report.pdf", "sizeFreed": 8}));

    let usage = router
        .oneshot(request("GET", "/storage-usage").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(json_body(usage).await, json!({"totalSizeBytes": 0}));
}

#[tokio::test]
async fn get_serves_full_body_with_headers() {
    let temp = TempDir::new().unwrap();
    let router = app(&temp).await;
    put(&router, "doc.pdf", b"%PDF-1.7 body").await;

    let res = router
        .oneshot(request("GET", "/file/doc.pdf").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(res.headers()[header::CONTENT_LENGTH], "13");
    assert_eq!(res.headers()[header::ACCEPT_RANGES], "bytes");
    assert!(res.headers().get(header::CONTENT_RANGE).is_none());
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"%PDF-1.7 body");
}

#[tokio::test]
async fn get_serves_partial_content() {
    let temp = TempDir::new().unwrap();
    let router = app(&temp).await;
    put(&router, "digits", b"0123456789").await;

    let res = router
        .oneshot(
            request("GET", "/file/digits")
                .header(header::RANGE, "bytes=2-5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(res.headers()[header::CONTENT_RANGE], "bytes 2-5/10");
    assert_eq!(res.headers()[header::CONTENT_LENGTH], "4");
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"2345");
}

#[tokio::test]
async fn unsatisfiable_range_is_416() {
    let temp = TempDir::new().unwrap();
    let router = app(&temp).await;
    put(&router, "digits", b"0123456789").await;

    let res = router
        .oneshot(
            request("GET", "/file/digits")
                .header(header::RANGE, "bytes=10-20")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(res.headers()[header::CONTENT_RANGE], "bytes */10");
}

#[tokio::test]
async fn missing_file_is_404() {
    let temp = TempDir::new().unwrap();
    let router = app(&temp).await;

    for method in ["GET", "DELETE"] {
        let res = router
            .clone()
            .oneshot(request(method, "/file/nothing.jpg").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{method}");
        assert_eq!(json_body(res).await, json!({"error": "File not found"}));
    }
}

#[tokio::test]
async fn download_url_without_url_is_400() {
    let temp = TempDir::new().unwrap();
    let router = app(&temp).await;

    for body in ["{}", "not json", r#"{"url": ""}"#] {
        let res = router
            .clone()
            .oneshot(
                request("POST", "/download-url")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(json_body(res).await, json!({"error": "Missing url field"}));
    }
}

#[tokio::test]
async fn provided_request_id_is_preserved() {
    let temp = TempDir::new().unwrap();
    let router = app(&temp).await;

    let res = router
        .oneshot(
            request("GET", "/storage-usage")
                .header("x-request-id", "req-test-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.headers()["x-request-id"], "req-test-123");
}
