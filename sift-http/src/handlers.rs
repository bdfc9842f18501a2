use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{info, warn};

use sift::{Catalog, SiftError};

use crate::dto::{parse_bulk, pretty_param, query_param, size_param};

pub struct AppState {
    pub catalog: Arc<Catalog>,
}

/// Error wrapper giving every failure the `{"error": "..."}` envelope and
/// the status from [`SiftError::status_code`].
pub struct ApiError(pub SiftError);

impl From<SiftError> for ApiError {
    fn from(e: SiftError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("request failed: {}", self.0);
        let body = serde_json::json!({ "error": self.0.to_string() });
        json_response(&body, false, self.0.status_code())
    }
}

/// Serialize `value` (optionally indented) with a trailing newline.
pub(crate) fn json_response<T: Serialize>(value: &T, pretty: bool, status: StatusCode) -> Response {
    let encoded = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match encoded {
        Ok(mut body) => {
            body.push('\n');
            (
                status,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "application/json")],
            format!("{{\"error\": \"{}\"}}\n", e),
        )
            .into_response(),
    }
}

/// GET `/{index}/_search?q=<query>&size=<n>&pretty`
pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let query = query_param(&params);
    let size = size_param(&params);
    let res = state.catalog.search(&index, &query, size).await?;
    Ok(json_response(&res, pretty_param(&params), StatusCode::OK))
}

/// GET `/{index}/_count`
pub async fn count(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let res = state.catalog.count(&index).await?;
    Ok(json_response(&res, pretty_param(&params), StatusCode::OK))
}

/// GET `/{index}/_refresh`
pub async fn refresh_index(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let res = state.catalog.refresh(Some(&index)).await?;
    Ok(json_response(&res, pretty_param(&params), StatusCode::OK))
}

/// GET `/_refresh`
pub async fn refresh_all(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let res = state.catalog.refresh(None).await?;
    Ok(json_response(&res, pretty_param(&params), StatusCode::OK))
}

/// GET `/_cluster/{cmd}` — only `health` is known.
pub async fn cluster(
    State(state): State<Arc<AppState>>,
    Path(cmd): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    match cmd.as_str() {
        "health" => {
            let res = state.catalog.cluster_health();
            Ok(json_response(&res, pretty_param(&params), StatusCode::OK))
        }
        other => Err(SiftError::UnknownCommand(format!("_cluster/{other}")).into()),
    }
}

/// GET `/_cat/{cmd}` — `indices` and `nodes` render plain-text tables.
pub async fn cat(
    State(state): State<Arc<AppState>>,
    Path(cmd): Path<String>,
) -> Result<Response, ApiError> {
    let table = match cmd.as_str() {
        "indices" => state.catalog.cat_indices().await,
        "nodes" => state.catalog.cat_nodes(),
        other => return Err(SiftError::UnknownCommand(format!("_cat/{other}")).into()),
    };
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        table,
    )
        .into_response())
}

#[derive(Serialize)]
struct BulkResponse {
    took: u64,
    errors: bool,
    items: usize,
}

/// POST `/_bulk` — newline-delimited action/data pairs, grouped per index,
/// one catalog write per group.
pub async fn bulk(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let payload = parse_bulk(&body);

    if payload.docs == 0 {
        return Err(SiftError::MalformedBulk(
            "no complete action/data pairs in payload".to_string(),
        )
        .into());
    }

    let mut errors = false;
    for (index, docs) in payload.groups {
        let n = docs.len();
        let header = state.catalog.index(&index, docs).await?;
        if header.failed > 0 {
            warn!(
                "bulk: {}/{} shards failed while indexing {} docs into {}",
                header.failed, header.total, n, index
            );
            errors = true;
        }
    }
    if payload.skipped > 0 {
        info!("bulk: skipped {} malformed lines", payload.skipped);
    }

    let res = BulkResponse {
        took: start.elapsed().as_millis() as u64,
        errors,
        items: payload.docs,
    };
    Ok(json_response(&res, pretty_param(&params), StatusCode::OK))
}
