use axum::{
    extract::State,
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use dog_vault::UsageReport;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::middleware::require_api_key;
use crate::AppState;

mod files;

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/storage-usage", get(storage_usage))
        .route(
            "/file/{filename}",
            get(files::get_file).put(files::upload_file).delete(files::delete_file),
        )
        .route("/download-url", post(files::download_url))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), require_api_key));

    let public = Router::new().route("/health", get(health));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn storage_usage(State(state): State<AppState>) -> Json<UsageReport> {
    Json(state.vault.usage())
}
