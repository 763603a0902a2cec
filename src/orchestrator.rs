use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::config::UploaderConfig;
use crate::error::{UploadError, UploadResult};
use crate::gateway::StorageGateway;
use crate::reader::ChunkReader;
use crate::retry::BackoffPolicy;
use crate::types::{BlockRecord, ProgressEvent, PublicReference, UploadSession, UploadTarget};
use crate::uploader::BlockUploader;

/// Receives a progress event after each successfully staged block
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

/// Default sink that discards progress events
struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _event: ProgressEvent) {}
}

/// Drives a whole-file chunked upload: segmentation, per-block staging with
/// retries, progress accounting, and the final atomic commit.
///
/// The manifest is always sorted by block index and validated gap-free
/// before commit, regardless of the order stage calls complete in. Commit
/// is issued at most once per upload; any staging failure or cancellation
/// skips it, leaving staged blocks to the backend's garbage collection.
pub struct BlobUploader {
    gateway: Arc<dyn StorageGateway>,
    uploader: BlockUploader,
    progress: Arc<dyn ProgressSink>,
    config: UploaderConfig,
}

impl BlobUploader {
    /// Create an uploader over the given gateway
    pub fn new<G: StorageGateway + 'static>(gateway: G, config: UploaderConfig) -> Self {
        Self::from_arc(Arc::new(gateway), config)
    }

    /// Create from a shared gateway handle
    pub fn from_arc(gateway: Arc<dyn StorageGateway>, config: UploaderConfig) -> Self {
        let uploader = BlockUploader::new(gateway.clone(), &config);
        Self {
            gateway,
            uploader,
            progress: Arc::new(NoopProgress),
            config,
        }
    }

    /// Substitute the inter-retry delay policy
    pub fn with_backoff<B: BackoffPolicy + 'static>(mut self, backoff: B) -> Self {
        self.uploader = self.uploader.with_backoff(backoff);
        self
    }

    /// Register a progress observer
    pub fn with_progress<P: ProgressSink + 'static>(mut self, sink: P) -> Self {
        self.progress = Arc::new(sink);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Upload a file, returning a reference for locating the committed
    /// object
    pub async fn upload<P: AsRef<Path>>(
        &self,
        path: P,
        target: &UploadTarget,
    ) -> UploadResult<PublicReference> {
        self.upload_with_cancellation(path, target, &CancellationToken::new())
            .await
    }

    /// Upload a file with caller-controlled cancellation.
    ///
    /// Cancellation stops issuing new stage attempts and skips commit; a
    /// cancelled manifest is never committed.
    #[instrument(skip_all, fields(container = %target.container, object = %target.object_name))]
    pub async fn upload_with_cancellation<P: AsRef<Path>>(
        &self,
        path: P,
        target: &UploadTarget,
        cancel: &CancellationToken,
    ) -> UploadResult<PublicReference> {
        let path = path.as_ref();

        // Init: resolve the source before any network call
        let mut reader = match ChunkReader::open(path, self.config.chunk_size).await {
            Ok(reader) => reader,
            Err(UploadError::Io { source })
                if matches!(
                    source.kind(),
                    ErrorKind::NotFound | ErrorKind::PermissionDenied
                ) =>
            {
                return Err(UploadError::not_found(path.display().to_string()));
            }
            Err(err) => return Err(err),
        };

        let total_bytes = reader.total_bytes();
        if total_bytes == 0 {
            return Err(UploadError::empty_file(path.display().to_string()));
        }

        self.provision(target).await?;

        info!(
            total_bytes,
            chunk_size = self.config.chunk_size,
            "starting chunked upload"
        );

        let mut session = UploadSession::new(total_bytes);
        if self.config.concurrency <= 1 {
            self.stage_sequential(&mut reader, &mut session, target, cancel)
                .await?;
        } else {
            self.stage_concurrent(&mut reader, &mut session, target, cancel)
                .await?;
        }
        drop(reader);

        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        // Committing: order by index and validate before the single commit
        let mut manifest = session.into_manifest();
        manifest.sort_by_index();
        manifest.validate().map_err(UploadError::commit)?;

        let reference = self
            .gateway
            .commit_block_list(
                target,
                &manifest.block_ids(),
                &target.content_type,
                self.config.upload_timeout,
            )
            .await
            .map_err(|err| UploadError::commit(err.message().to_string()))?;

        info!(blocks = manifest.len(), reference = %reference, "upload committed");
        Ok(reference)
    }

    /// Container provisioning and access policy, per config
    async fn provision(&self, target: &UploadTarget) -> UploadResult<()> {
        if self.config.ensure_container {
            self.gateway
                .ensure_container_exists(&target.container)
                .await
                .map_err(UploadError::Gateway)?;
        }
        if let Some(policy) = self.config.public_access {
            self.gateway
                .set_public_access(&target.container, policy)
                .await
                .map_err(UploadError::Gateway)?;
        }
        Ok(())
    }

    /// Baseline staging: one block in flight at a time
    async fn stage_sequential(
        &self,
        reader: &mut ChunkReader,
        session: &mut UploadSession,
        target: &UploadTarget,
        cancel: &CancellationToken,
    ) -> UploadResult<()> {
        while let Some(block) = reader.next_block().await? {
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }
            let record = self.uploader.stage(target, &block, cancel).await?;
            self.note_progress(session, record);
        }
        Ok(())
    }

    /// Bounded-concurrency staging. A semaphore permit is acquired before
    /// each block is read, so at most `concurrency` blocks are resident and
    /// in flight. Records fold into the session from this single task, and
    /// the first failure cancels and aborts all remaining work: the session
    /// never reaches commit with a partial manifest.
    async fn stage_concurrent(
        &self,
        reader: &mut ChunkReader,
        session: &mut UploadSession,
        target: &UploadTarget,
        cancel: &CancellationToken,
    ) -> UploadResult<()> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks: JoinSet<UploadResult<BlockRecord>> = JoinSet::new();
        let inflight = cancel.child_token();
        let mut failure: Option<UploadError> = None;

        'produce: loop {
            while let Some(joined) = tasks.try_join_next() {
                if let Err(err) = self.collect(joined, session) {
                    failure = Some(err);
                    break 'produce;
                }
            }

            if inflight.is_cancelled() {
                failure = Some(UploadError::Cancelled);
                break;
            }

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let block = match reader.next_block().await {
                Ok(Some(block)) => block,
                Ok(None) => break,
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            };

            let uploader = self.uploader.clone();
            let target = target.clone();
            let token = inflight.clone();
            tasks.spawn(async move {
                let record = uploader.stage(&target, &block, &token).await;
                drop(permit);
                record
            });
        }

        if failure.is_some() {
            inflight.cancel();
            tasks.abort_all();
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = self.collect(joined, session) {
                if failure.is_none() {
                    inflight.cancel();
                    tasks.abort_all();
                    failure = Some(err);
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn collect(
        &self,
        joined: Result<UploadResult<BlockRecord>, JoinError>,
        session: &mut UploadSession,
    ) -> UploadResult<()> {
        match joined {
            Ok(Ok(record)) => {
                self.note_progress(session, record);
                Ok(())
            }
            Ok(Err(err)) => Err(err),
            Err(join_err) if join_err.is_panic() => {
                std::panic::resume_unwind(join_err.into_panic())
            }
            // Aborted task
            Err(_) => Err(UploadError::Cancelled),
        }
    }

    fn note_progress(&self, session: &mut UploadSession, record: BlockRecord) {
        let event = session.record(record);
        debug!(
            index = event.index,
            bytes_uploaded = event.bytes_uploaded,
            percent = format_args!("{:.2}", event.fraction() * 100.0),
            "block confirmed"
        );
        self.progress.on_progress(event);
    }
}
