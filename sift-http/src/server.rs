use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use sift::Catalog;

use crate::handlers::{self, AppState};

/// A panic anywhere in a handler becomes the standard error envelope
/// instead of a torn body.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    error!("request handler panicked: {}", detail);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "application/json")],
        "{\"error\": \"internal server error\"}\n".to_string(),
    )
        .into_response()
}

/// The Elasticsearch-compatible route table.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/_bulk", post(handlers::bulk))
        .route("/_refresh", get(handlers::refresh_all))
        .route("/_cluster/:cmd", get(handlers::cluster))
        .route("/_cat/:cmd", get(handlers::cat))
        .route("/:index/_search", get(handlers::search))
        .route("/:index/_count", get(handlers::count))
        .route("/:index/_refresh", get(handlers::refresh_index))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(catalog: Arc<Catalog>, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState { catalog });
    let app = build_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
