//! Error types for the registration pipeline

use document_renderer::{DocumentKind, RenderError};
use registrar_common::SerialNumber;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Registration store failures
#[derive(Error, Debug)]
pub enum StoreError {
    /// A registration with this serial is already stored
    #[error("Registration {0} already exists")]
    DuplicateSerial(SerialNumber),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Object storage upload failures
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage rejected upload with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Email delivery failures
#[derive(Error, Debug)]
pub enum MailError {
    #[error("Registration has no email address")]
    NoRecipient,

    #[error("Failed to read attachment {path}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Mail request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mail service rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Mail request timed out")]
    Timeout,
}

/// Batch flush failures; the pending queue is left untouched
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to read registrations: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to build spreadsheet: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("Failed to send batch email: {0}")]
    Mail(#[from] MailError),

    #[error("Registration export timed out")]
    Timeout,
}

/// Failures that abort a submission
#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Failed to render {kind}: {source}")]
    Render {
        kind: DocumentKind,
        #[source]
        source: RenderError,
    },

    #[error("Failed to save registration: {0}")]
    Persist(#[from] StoreError),

    #[error("{step} timed out after {after:?}")]
    Timeout { step: &'static str, after: Duration },
}

impl SubmissionError {
    /// Diagnostic category used in logs
    pub fn category(&self) -> &'static str {
        match self {
            SubmissionError::Render {
                source: RenderError::MissingAsset { .. },
                ..
            } => "asset",
            SubmissionError::Render { .. } => "render",
            SubmissionError::Persist(_) => "persistence",
            SubmissionError::Timeout { .. } => "timeout",
        }
    }
}
