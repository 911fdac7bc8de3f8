use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{UploadId, UploadStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Conflict,
    Validation,
    UnsupportedType,
    TooLarge,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("no upload record with id {0}")]
    NotFound(UploadId),
    #[error("upload {id} already finished with status {status}")]
    AlreadyTerminal { id: UploadId, status: UploadStatus },
    #[error("upload {0} was cancelled")]
    Cancelled(UploadId),
    #[error("invalid submission: {0}")]
    Validation(String),
    #[error("unsupported file type for '{name}': {mime}")]
    UnsupportedType { name: String, mime: String },
    #[error("'{name}' is {size} bytes, above the {limit} byte limit")]
    TooLarge { name: String, size: u64, limit: u64 },
}

impl UploadError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::AlreadyTerminal { .. } | Self::Cancelled(_) => ErrorCode::Conflict,
            Self::Validation(_) => ErrorCode::Validation,
            Self::UnsupportedType { .. } => ErrorCode::UnsupportedType,
            Self::TooLarge { .. } => ErrorCode::TooLarge,
        }
    }
}

/// Serializable form of an [`UploadError`] for display surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&UploadError> for ErrorReport {
    fn from(value: &UploadError) -> Self {
        Self::new(value.code(), value.to_string())
    }
}

impl From<UploadError> for ErrorReport {
    fn from(value: UploadError) -> Self {
        Self::from(&value)
    }
}
