use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dog_vault::{ByteStream, DeleteReceipt, IngestReceipt, UploadReceipt};
use futures::TryStreamExt;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub async fn upload_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<Json<UploadReceipt>> {
    let stream: ByteStream = Box::pin(
        body.into_data_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
    );
    let content_type = header_str(&headers, header::CONTENT_TYPE);

    let receipt = state.vault.upload(&filename, stream, content_type).await?;
    Ok(Json(receipt))
}

pub async fn get_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let range = header_str(&headers, header::RANGE);
    let download = state.vault.open(&filename, range).await?;

    let status = if download.is_partial() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let content_range = download.content_range();
    let content_type = HeaderValue::from_str(&download.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(dog_vault::sniff::DEFAULT_CONTENT_TYPE));

    let mut response = (status, Body::from_stream(download.stream)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(download.content_length));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Some(value) = content_range.and_then(|v| HeaderValue::from_str(&v).ok()) {
        headers.insert(header::CONTENT_RANGE, value);
    }
    Ok(response)
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Json<DeleteReceipt>> {
    let receipt = state.vault.delete(&filename).await?;
    Ok(Json(receipt))
}

#[derive(Debug, Deserialize)]
pub struct DownloadUrlRequest {
    #[serde(default)]
    pub url: String,
}

pub async fn download_url(
    State(state): State<AppState>,
    payload: Result<Json<DownloadUrlRequest>, JsonRejection>,
) -> ApiResult<Json<IngestReceipt>> {
    let url = match payload {
        Ok(Json(req)) if !req.url.trim().is_empty() => req.url,
        _ => return Err(ApiError::BadRequest("Missing url field".to_string())),
    };

    let receipt = state.vault.ingest(&url).await?;
    Ok(Json(receipt))
}
