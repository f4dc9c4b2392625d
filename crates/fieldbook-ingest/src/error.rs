//! Rejections returned to uploaders

use fieldbook_core::payload::UPLOAD_SOURCE;
use fieldbook_core::{CodedError, ErrorCode, ErrorKind};
use fieldbook_storage::StorageError;
use thiserror::Error;

/// Why an upload was refused
///
/// Uploads fail fast, so a rejection carries exactly one `{source, code}`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("upload rejected: {0}")]
pub struct Rejection(pub CodedError);

impl Rejection {
    pub fn new(source: impl Into<String>, code: ErrorCode) -> Self {
        Self(CodedError::new(source, code))
    }

    pub fn code(&self) -> ErrorCode {
        self.0.code
    }

    pub fn source_ref(&self) -> &str {
        &self.0.source
    }

    pub fn kind(&self) -> ErrorKind {
        self.0.kind()
    }

    /// The wire list of errors
    pub fn errors(&self) -> Vec<CodedError> {
        vec![self.0.clone()]
    }
}

impl From<CodedError> for Rejection {
    fn from(error: CodedError) -> Self {
        Self(error)
    }
}

/// Storage details are logged and never shown to the client
impl From<StorageError> for Rejection {
    fn from(error: StorageError) -> Self {
        tracing::error!(error = %error, "storage failure during upload");
        Self::new(UPLOAD_SOURCE, ErrorCode::StorageFailure)
    }
}
