//! JSON envelopes returned to clients

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fieldbook_core::{CodedError, ErrorCode, ErrorKind};
use fieldbook_ingest::{Rejection, UploadOutcome};
use serde_json::json;

/// Status for a failure class: storage faults are the server's, the rest
/// are the client's
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// `{errors: [{source, code}]}` with a matching status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    errors: Vec<CodedError>,
}

impl ApiError {
    pub fn new(source: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            status: status_for(code.kind()),
            errors: vec![CodedError::new(source, code)],
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        Self {
            status: status_for(rejection.kind()),
            errors: rejection.errors(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "errors": self.errors }))).into_response()
    }
}

/// `{data: {code, title}}`
pub fn success(outcome: UploadOutcome) -> Response {
    (StatusCode::OK, Json(json!({ "data": outcome }))).into_response()
}
