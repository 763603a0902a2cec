use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

use crate::types::{BlockId, PublicReference, UploadTarget};

/// Remote storage failure classification - determines retry behavior
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Transient error - staging may succeed on retry (network, timeout)
    #[error("transient storage error: {0}")]
    Transient(String),

    /// Fatal error - fail immediately, no retry (auth, validation, rejection)
    #[error("fatal storage error: {0}")]
    Fatal(String),
}

impl GatewayError {
    /// Create a transient error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a fatal error
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Check if this error is worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        match self {
            Self::Transient(msg) | Self::Fatal(msg) => msg,
        }
    }
}

/// Public read access policy for a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Container listing and all objects are publicly readable
    Container,
    /// Individual objects are publicly readable, listing is not
    Object,
}

/// Remote object-storage operations - must be implemented by all backends.
///
/// Objects become visible to readers only after a successful
/// `commit_block_list`; staged-but-uncommitted blocks are expected to be
/// garbage-collected by the backend after a time window.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Stage one block into temporary, uncommitted storage
    async fn stage_block(
        &self,
        target: &UploadTarget,
        block_id: &BlockId,
        data: Bytes,
        timeout: Duration,
    ) -> Result<(), GatewayError>;

    /// Atomically commit an ordered block list as a single object.
    ///
    /// Committing the same ordered list twice must be safe to attempt; a
    /// backend may reject the second commit, but must never produce a
    /// different object.
    async fn commit_block_list(
        &self,
        target: &UploadTarget,
        block_ids: &[BlockId],
        content_type: &str,
        timeout: Duration,
    ) -> Result<PublicReference, GatewayError>;

    /// Ensure the container exists (idempotent: succeeds whether newly
    /// created or already present)
    async fn ensure_container_exists(&self, container: &str) -> Result<(), GatewayError>;

    /// Configure public read access on a container
    async fn set_public_access(
        &self,
        container: &str,
        policy: AccessPolicy,
    ) -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_retryable() {
        assert!(GatewayError::transient("connection reset").is_transient());
        assert!(!GatewayError::fatal("403 forbidden").is_transient());
    }

    #[test]
    fn message_is_preserved() {
        assert_eq!(GatewayError::transient("timed out").message(), "timed out");
        assert_eq!(GatewayError::fatal("bad request").message(), "bad request");
    }
}
