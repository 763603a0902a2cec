use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::UploaderConfig;
use crate::error::{UploadError, UploadResult};
use crate::gateway::{GatewayError, StorageGateway};
use crate::retry::{BackoffPolicy, FixedDelay};
use crate::types::{Block, BlockId, BlockRecord, UploadTarget};

/// Stages one block with bounded retries.
///
/// Only transient failures are retried; fatal gateway rejections propagate
/// immediately. A timed-out attempt counts against the retry budget.
#[derive(Clone)]
pub struct BlockUploader {
    gateway: Arc<dyn StorageGateway>,
    backoff: Arc<dyn BackoffPolicy>,
    max_retries: u32,
    upload_timeout: Duration,
}

impl BlockUploader {
    pub fn new(gateway: Arc<dyn StorageGateway>, config: &UploaderConfig) -> Self {
        Self {
            gateway,
            backoff: Arc::new(FixedDelay(config.retry_delay)),
            max_retries: config.max_retries.max(1),
            upload_timeout: config.upload_timeout,
        }
    }

    /// Substitute the inter-retry delay policy
    pub fn with_backoff<B: BackoffPolicy + 'static>(mut self, backoff: B) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Stage a block, retrying transient failures up to the attempt budget.
    ///
    /// The block id is generated once and reused across attempts, so a
    /// retried stage overwrites the same staged block rather than leaking a
    /// new one per attempt.
    pub async fn stage(
        &self,
        target: &UploadTarget,
        block: &Block,
        cancel: &CancellationToken,
    ) -> UploadResult<BlockRecord> {
        let block_id = BlockId::new();
        let mut attempt = 1u32;

        loop {
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }

            let outcome = match tokio::time::timeout(
                self.upload_timeout,
                self.gateway
                    .stage_block(target, &block_id, block.data.clone(), self.upload_timeout),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(GatewayError::transient(format!(
                    "stage attempt timed out after {:?}",
                    self.upload_timeout
                ))),
            };

            match outcome {
                Ok(()) => {
                    debug!(index = block.index, attempt, "block staged");
                    return Ok(BlockRecord {
                        block_id,
                        index: block.index,
                        size_bytes: block.len() as u64,
                    });
                }
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    warn!(
                        index = block.index,
                        attempt,
                        error = %err,
                        "stage attempt failed, retrying"
                    );
                    let delay = self.backoff.delay(attempt);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(err) if err.is_transient() => {
                    error!(
                        index = block.index,
                        attempts = attempt,
                        error = %err,
                        "stage failed, retry budget exhausted"
                    );
                    return Err(UploadError::block_upload(block.index, attempt, err));
                }
                Err(err) => {
                    error!(index = block.index, error = %err, "stage rejected");
                    return Err(UploadError::Gateway(err));
                }
            }
        }
    }
}
