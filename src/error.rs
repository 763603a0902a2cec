use thiserror::Error;

use crate::gateway::GatewayError;

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Errors that can occur during a chunked upload
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("source file not found: {path}")]
    NotFound { path: String },

    #[error("source file is empty: {path}")]
    EmptyFile { path: String },

    #[error("I/O error reading source: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("staging block {index} failed after {attempts} attempts: {source}")]
    BlockUpload {
        index: u64,
        attempts: u32,
        #[source]
        source: GatewayError,
    },

    #[error("storage gateway rejected the request: {0}")]
    Gateway(GatewayError),

    #[error("commit rejected: {reason}")]
    Commit { reason: String },

    #[error("upload cancelled")]
    Cancelled,
}

impl UploadError {
    /// Create a not found error
    pub fn not_found<S: Into<String>>(path: S) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an empty file error
    pub fn empty_file<S: Into<String>>(path: S) -> Self {
        Self::EmptyFile { path: path.into() }
    }

    /// Create a block upload error (retry budget exhausted)
    pub fn block_upload(index: u64, attempts: u32, source: GatewayError) -> Self {
        Self::BlockUpload {
            index,
            attempts,
            source,
        }
    }

    /// Create a commit error
    pub fn commit<S: Into<String>>(reason: S) -> Self {
        Self::Commit {
            reason: reason.into(),
        }
    }
}
