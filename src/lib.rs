//! # blockstage: chunked uploads with an atomic stage/commit protocol
//!
//! `blockstage` uploads a large local file to a remote object-storage
//! service by splitting it into fixed-size blocks, staging each block
//! independently with bounded retries, and atomically committing the
//! ordered block list as a single object. A multi-request upload appears
//! atomic to the caller: the object becomes visible only after the commit
//! succeeds, and a failed or cancelled upload never commits a partial
//! manifest.
//!
//! ## Key features
//!
//! - **Bounded memory**: one chunk in flight at a time in the baseline,
//!   or a configurable bounded worker pool
//! - **Typed retry classification**: transient failures are retried with a
//!   pluggable backoff policy, fatal failures propagate immediately
//! - **Backend agnostic**: the storage service sits behind the
//!   [`StorageGateway`] trait; an in-memory implementation ships for tests
//! - **Progress accounting**: a monotone per-block progress event stream
//!
//! ## Quick start
//!
//! ```rust
//! use blockstage::prelude::*;
//! use blockstage::MemoryGateway;
//!
//! # async fn run() -> UploadResult<()> {
//! let uploader = BlobUploader::new(MemoryGateway::new(), UploaderConfig::default());
//!
//! let target = UploadTarget::new("videos", "clip.mp4")
//!     .with_content_type("video/mp4");
//!
//! let reference = uploader.upload("./clip.mp4", &target).await?;
//! println!("uploaded to {reference}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  BlobUploader   │  ← upload state machine, manifest, commit
//! ├─────────────────┤
//! │  BlockUploader  │  ← per-block retry/backoff
//! ├─────────────────┤
//! │  ChunkReader    │  ← fixed-size segmentation
//! ├─────────────────┤
//! │ StorageGateway  │  ← stage-block / commit-block-list backend
//! └─────────────────┘
//! ```

mod config;
mod error;
pub mod gateway;
mod memory;
mod orchestrator;
mod reader;
pub mod retry;
mod types;
mod uploader;

// Re-export main types for clean API
pub use config::UploaderConfig;
pub use error::{UploadError, UploadResult};
pub use gateway::{AccessPolicy, GatewayError, StorageGateway};
pub use memory::MemoryGateway;
pub use orchestrator::{BlobUploader, ProgressSink};
pub use reader::ChunkReader;
pub use retry::{BackoffPolicy, ExponentialDelay, FixedDelay};
pub use types::{
    Block, BlockId, BlockRecord, Manifest, ProgressEvent, PublicReference, UploadSession,
    UploadTarget,
};
pub use uploader::BlockUploader;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobUploader, ProgressEvent, ProgressSink, PublicReference, StorageGateway, UploadError,
        UploadResult, UploadTarget, UploaderConfig,
    };
}
