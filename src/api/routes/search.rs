//! Search Routes
//!
//! - GET /search - Records, errors and statistics
//! - GET /count - Statistics only
//! - GET /search/show - Previously found records
//! - GET /pcap/search - Packet capture search
//! - GET /pcap/count - Packet capture statistics
//!
//! The response format follows the `Accept` header; `stream`, `spark`
//! and `stats` choose the document layout.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::Response,
};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::params::{QueryParams, SearchRequest};
use crate::api::state::AppState;
use crate::api::stream;
use crate::codec::Format;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Search,
    Count,
    Show,
    PcapSearch,
    PcapCount,
}

/// GET /search
pub async fn search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    run(Operation::Search, &state, &headers, pairs)
}

/// GET /count
pub async fn count(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    run(Operation::Count, &state, &headers, pairs)
}

/// GET /search/show
pub async fn show(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    run(Operation::Show, &state, &headers, pairs)
}

/// GET /pcap/search
pub async fn pcap_search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    run(Operation::PcapSearch, &state, &headers, pairs)
}

/// GET /pcap/count
pub async fn pcap_count(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    run(Operation::PcapCount, &state, &headers, pairs)
}

fn run(
    op: Operation,
    state: &AppState,
    headers: &HeaderMap,
    pairs: Vec<(String, String)>,
) -> ApiResult<Response> {
    let req = SearchRequest::parse(&QueryParams::from(pairs))?;
    if req.cfg.query.is_empty() && op != Operation::Show {
        return Err(ApiError::Validation("no search query provided".to_string()));
    }
    if let Some(home) = &state.config.home {
        req.cfg.check_relative_to_home(home)?;
    }

    let format = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(Format::from_mime)
        .unwrap_or(Format::Json);

    tracing::info!(op = ?op, format = ?format, layout = ?req.layout(), "{}", req.cfg);

    let backend = &state.backend;
    let result = match op {
        Operation::Search => backend.search(&req.cfg),
        Operation::Count => backend.count(&req.cfg),
        Operation::Show => backend.show(&req.cfg),
        Operation::PcapSearch => backend.pcap_search(&req.cfg),
        Operation::PcapCount => backend.pcap_search(&req.cfg.clone().count_only()),
    }?;

    Ok(stream::respond(result, format, req.layout(), req.stats))
}
