use std::time::Duration;

use crate::gateway::AccessPolicy;

/// Configuration for chunked uploads.
///
/// Immutable once constructed; passed into the uploader at construction so
/// the core stays testable against fake gateways.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Size of each block read from the source file
    pub chunk_size: usize,

    /// Deadline for a single stage or commit request
    pub upload_timeout: Duration,

    /// Attempts per block before the upload fails
    pub max_retries: u32,

    /// Delay between retry attempts (fixed-delay baseline)
    pub retry_delay: Duration,

    /// Blocks staged in flight at once. 1 = strictly sequential.
    pub concurrency: usize,

    /// Provision the target container before staging
    pub ensure_container: bool,

    /// Configure public read access on the container before staging
    pub public_access: Option<AccessPolicy>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512 * 1024, // 512 KiB chunks for reliability
            upload_timeout: Duration::from_secs(900),
            max_retries: 5,
            retry_delay: Duration::from_secs(3),
            concurrency: 1,
            ensure_container: true,
            public_access: None,
        }
    }
}

impl UploaderConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the block size in bytes
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Set the per-request deadline
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// Set the per-block attempt budget
    pub fn with_max_retries(mut self, attempts: u32) -> Self {
        self.max_retries = attempts;
        self
    }

    /// Set the delay between retry attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the number of blocks staged in flight at once
    pub fn with_concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers.max(1);
        self
    }

    /// Skip container provisioning (caller guarantees it exists)
    pub fn without_container_provisioning(mut self) -> Self {
        self.ensure_container = false;
        self
    }

    /// Make the container publicly readable before uploading
    pub fn with_public_access(mut self, policy: AccessPolicy) -> Self {
        self.public_access = Some(policy);
        self
    }
}
