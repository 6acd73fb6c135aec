//! Error types and handling for the redaction audit library
//! Created: 2025-06-03 11:31:05 UTC
//! Author: kartik4905

use std::{
    error::Error as StdError,
    io,
    path::PathBuf,
    result::Result as StdResult,
    time::Duration,
};

use thiserror::Error;

use crate::report::ReportError;

/// Custom result type for audit operations
pub type Result<T> = StdResult<T, Error>;

/// Core error type for audit operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The document is encrypted and the empty user password was rejected
    #[error("PDF is encrypted and requires a password")]
    EncryptedDocument,

    #[error("Invalid or corrupt PDF: {0}")]
    CorruptDocument(String),

    /// A single structural check failed; recorded as a note, never fatal
    #[error("{check} check failed: {reason}")]
    PartialCheckFailure { check: &'static str, reason: String },

    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Page {page} could not be read: {reason}")]
    PageUnavailable { page: usize, reason: String },

    #[error("Malformed structure: {0}")]
    MalformedStructure(String),

    #[error("Audit timed out after {0:?}")]
    Timeout(Duration),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Internal error: {0}")]
    InternalError(#[source] Box<dyn StdError + Send + Sync>),
}

impl Error {
    /// Wraps any error raised inside a structural check
    pub fn check(check: &'static str, reason: impl ToString) -> Self {
        Error::PartialCheckFailure {
            check,
            reason: reason.to_string(),
        }
    }

    /// Errors that stop a whole run before any document is processed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InputNotFound(_) | Error::InvalidArgument(_) | Error::InvalidConfiguration(_)
        )
    }
}
