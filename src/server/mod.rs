//! HTTP transport — thin axum layer over the fetch orchestrator
//!
//! One route: `POST /fetch/*target`. The transport only decides whether the
//! body was declared JSON and maps the orchestrator's outcome to a status;
//! every protocol decision lives in [`crate::fetch`]. Each request runs the
//! blocking core on its own worker so a slow verification or a large
//! directory packaging never stalls concurrent requests.

use crate::fetch::{FetchOrchestrator, FetchPayload, FetchRequest};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;

/// Build the application router.
pub fn router(orchestrator: Arc<FetchOrchestrator>) -> Router {
    Router::new()
        .route("/fetch/*target", post(fetch))
        .with_state(orchestrator)
}

/// Bind and serve until the process is stopped.
pub async fn serve(addr: &str, orchestrator: Arc<FetchOrchestrator>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, router(orchestrator)).await
}

async fn fetch(
    State(orchestrator): State<Arc<FetchOrchestrator>>,
    Path(target): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);

    let handled = tokio::task::spawn_blocking(move || {
        orchestrator.handle(FetchRequest {
            target: &target,
            body: &body,
            json,
        })
    })
    .await;

    match handled {
        Ok(Ok(FetchPayload::Sealed(envelope))) => (StatusCode::OK, Json(envelope)).into_response(),
        Ok(Ok(FetchPayload::Plain(bytes))) => (StatusCode::OK, bytes).into_response(),
        Ok(Err(rejection)) => {
            let status = StatusCode::from_u16(rejection.status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, rejection.to_string()).into_response()
        }
        Err(e) => {
            log::error!("fetch worker panicked: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
