//! Requester identity and the import token check

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use fieldbook_core::ErrorCode;

use crate::response::ApiError;
use crate::routes::AppState;

/// Header carrying the user id, set by the authenticating proxy upstream
pub const USER_ID_HEADER: &str = "x-user-id";

const IMPORT_SOURCE: &str = "import";

/// The user id of an upload; `None` for anonymous requests
pub fn user_id(headers: &HeaderMap) -> Result<Option<u64>, ApiError> {
    let Some(raw) = headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };
    raw.to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Some)
        .ok_or_else(|| ApiError::new("upload", ErrorCode::PayloadInvalid))
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Guards the import route; without a configured token import is disabled
pub async fn import_auth(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.import_token.as_deref() else {
        tracing::warn!("import attempted but no import token is configured");
        return ApiError::new(IMPORT_SOURCE, ErrorCode::UploadForbidden)
            .with_status(StatusCode::FORBIDDEN)
            .into_response();
    };

    match bearer(&headers) {
        Some(token) if token == expected => next.run(request).await,
        _ => ApiError::new(IMPORT_SOURCE, ErrorCode::UploadForbidden)
            .with_status(StatusCode::UNAUTHORIZED)
            .into_response(),
    }
}
