// src/api.rs
//! Read-only HTTP surface over the digest archive.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::archive::{ArchiveStore, IndexEntry};
use crate::selection::Digest;

#[derive(Clone)]
pub struct AppState {
    store: Arc<ArchiveStore>,
}

type ApiError = (StatusCode, String);

pub fn router(store: ArchiveStore) -> Router {
    let files = ServeDir::new(store.root().to_path_buf());
    let state = AppState {
        store: Arc::new(store),
    };

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/digest/latest", get(latest))
        .route("/digest/{date}", get(by_date))
        .route("/archive", get(archive_index))
        .nest_service("/files", files)
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn internal(e: anyhow::Error) -> ApiError {
    tracing::warn!(error = %format!("{e:#}"), "archive read failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "archive read failed".to_string())
}

async fn latest(State(state): State<AppState>) -> Result<Json<Digest>, ApiError> {
    match state.store.load_latest().map_err(internal)? {
        Some(d) => Ok(Json(d)),
        None => Err((StatusCode::NOT_FOUND, "no digest published yet".to_string())),
    }
}

async fn by_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Digest>, ApiError> {
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| (StatusCode::BAD_REQUEST, format!("bad date `{date}`, want YYYY-MM-DD")))?;
    match state.store.load_date(date).map_err(internal)? {
        Some(d) => Ok(Json(d)),
        None => Err((StatusCode::NOT_FOUND, format!("no digest for {date}"))),
    }
}

async fn archive_index(State(state): State<AppState>) -> Result<Json<Vec<IndexEntry>>, ApiError> {
    Ok(Json(state.store.list().map_err(internal)?))
}
