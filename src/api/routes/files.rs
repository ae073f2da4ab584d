//! Files Route
//!
//! - GET /files?dir=...&hidden=true - Directory listing

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::FilesQuery;
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::search::DirInfo;

/// GET /files
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FilesQuery>,
) -> ApiResult<Json<DirInfo>> {
    tracing::debug!(dir = %query.dir, hidden = query.hidden, "listing directory");
    let info = state.backend.files(&query.dir, query.hidden).await?;
    Ok(Json(info))
}
