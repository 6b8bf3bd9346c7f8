// ABOUTME: HTTP serving component: an axum router whose fallback resolves request paths through the Api.
// ABOUTME: Maps Unhandled to 404 and pipeline errors to 5xx responses with a readable message.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;

use crate::api::{request_path, Api, Resolution};
use crate::error::{Error, ErrorCode};
use crate::events::Category;

/// Build the axum Router. Every GET path is handed to [`Api::handle_miss`].
pub fn router(api: Arc<Api>) -> Router {
    Router::new().fallback(fallback).with_state(api)
}

/// Bind `addr` and serve until the task is dropped or the listener fails.
pub async fn serve(api: Arc<Api>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(category = %Category::Serving, "listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(api)).await?;
    Ok(())
}

async fn fallback(State(api): State<Arc<Api>>, method: Method, uri: Uri) -> Response {
    if method != Method::GET {
        return error_response(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", "only GET is supported");
    }

    let path = request_path(uri.path(), uri.query());
    match api.handle_miss(uri.path(), uri.query()).await {
        Ok(Resolution::Found(result)) => match serde_json::to_string(&*result) {
            Ok(body) => {
                tracing::info!(category = %Category::Received, path = %path, bytes = body.len(), "response sent");
                ([(header::CONTENT_TYPE, "application/json")], body).into_response()
            }
            Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "serialize", &e.to_string()),
        },
        Ok(Resolution::Unhandled) => {
            tracing::debug!(category = %Category::Received, path = %path, status = 404, "no route");
            error_response(StatusCode::NOT_FOUND, "not_found", &format!("no item handles {}", path))
        }
        Err(e) => {
            let status = status_for(&e);
            tracing::warn!(category = %Category::Received, path = %path, status = status.as_u16(), error = %e, "resolution failed");
            error_response(status, &e.code.to_string().replace(' ', "_"), &e.to_string())
        }
    }
}

/// HTTP status for a pipeline error.
pub fn status_for(err: &Error) -> StatusCode {
    match err.code {
        ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorCode::Fetch | ErrorCode::InvalidUrl => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "code": code, "message": message } })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_for_codes() {
        assert_eq!(status_for(&Error::timeout("/a", "Fetch", None)), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_for(&Error::fetch("/a", "Fetch", None)), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(&Error::extract("/a", "Extract", None)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
