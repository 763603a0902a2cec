use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::gateway::{AccessPolicy, GatewayError, StorageGateway};
use crate::types::{BlockId, PublicReference, UploadTarget};

/// In-memory storage gateway for tests and local development.
///
/// Staged blocks live per target until committed; commit assembles them in
/// manifest order and makes the object readable. A second commit of the
/// same object is rejected with a fatal error, mirroring backends where a
/// committed object name cannot be re-committed. Stage and commit failures
/// can be scripted by call ordinal for exercising retry paths.
#[derive(Default)]
pub struct MemoryGateway {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    containers: HashSet<String>,
    policies: HashMap<String, AccessPolicy>,
    staged: HashMap<String, HashMap<BlockId, Bytes>>,
    committed: HashMap<String, CommittedObject>,
    stage_calls: u64,
    commit_calls: u64,
    transient_stage_calls: HashSet<u64>,
    fatal_stage_calls: HashSet<u64>,
    failing_commits: u32,
    operations: Vec<&'static str>,
}

struct CommittedObject {
    data: Vec<u8>,
    content_type: String,
}

fn object_key(target: &UploadTarget) -> String {
    format!("{}/{}", target.container, target.object_name)
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the given stage calls (1-based ordinals) with a transient error
    pub fn fail_stage_calls<I: IntoIterator<Item = u64>>(&self, calls: I) {
        self.inner.lock().transient_stage_calls.extend(calls);
    }

    /// Fail the given stage call (1-based ordinal) with a fatal error
    pub fn fail_stage_call_fatal(&self, call: u64) {
        self.inner.lock().fatal_stage_calls.insert(call);
    }

    /// Fail the next `n` commit calls with a fatal error
    pub fn fail_commits(&self, n: u32) {
        self.inner.lock().failing_commits = n;
    }

    /// Number of stage calls observed (retries included)
    pub fn stage_calls(&self) -> u64 {
        self.inner.lock().stage_calls
    }

    /// Number of commit calls observed
    pub fn commit_calls(&self) -> u64 {
        self.inner.lock().commit_calls
    }

    /// Gateway operations in invocation order, for asserting call ordering
    pub fn operations(&self) -> Vec<&'static str> {
        self.inner.lock().operations.clone()
    }

    /// Staged-but-uncommitted block count for a target
    pub fn staged_block_count(&self, target: &UploadTarget) -> usize {
        self.inner
            .lock()
            .staged
            .get(&object_key(target))
            .map_or(0, |blocks| blocks.len())
    }

    /// Assembled bytes of a committed object, if any
    pub fn committed_object(&self, target: &UploadTarget) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .committed
            .get(&object_key(target))
            .map(|object| object.data.clone())
    }

    /// Content type of a committed object, if any
    pub fn committed_content_type(&self, target: &UploadTarget) -> Option<String> {
        self.inner
            .lock()
            .committed
            .get(&object_key(target))
            .map(|object| object.content_type.clone())
    }

    pub fn has_container(&self, container: &str) -> bool {
        self.inner.lock().containers.contains(container)
    }

    pub fn access_policy(&self, container: &str) -> Option<AccessPolicy> {
        self.inner.lock().policies.get(container).copied()
    }
}

#[async_trait]
impl StorageGateway for MemoryGateway {
    async fn stage_block(
        &self,
        target: &UploadTarget,
        block_id: &BlockId,
        data: Bytes,
        _timeout: Duration,
    ) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock();
        inner.stage_calls += 1;
        inner.operations.push("stage_block");
        let call = inner.stage_calls;

        if inner.fatal_stage_calls.contains(&call) {
            return Err(GatewayError::fatal("stage rejected"));
        }
        if inner.transient_stage_calls.contains(&call) {
            return Err(GatewayError::transient("connection reset"));
        }

        inner
            .staged
            .entry(object_key(target))
            .or_default()
            .insert(block_id.clone(), data);
        Ok(())
    }

    async fn commit_block_list(
        &self,
        target: &UploadTarget,
        block_ids: &[BlockId],
        content_type: &str,
        _timeout: Duration,
    ) -> Result<PublicReference, GatewayError> {
        let mut inner = self.inner.lock();
        inner.commit_calls += 1;
        inner.operations.push("commit_block_list");

        if inner.failing_commits > 0 {
            inner.failing_commits -= 1;
            return Err(GatewayError::fatal("commit rejected"));
        }

        let key = object_key(target);
        if inner.committed.contains_key(&key) {
            return Err(GatewayError::fatal(format!(
                "object already committed: {key}"
            )));
        }

        // Resolve every block before consuming the staged set, so a
        // rejected commit leaves it intact
        let mut data = Vec::new();
        for block_id in block_ids {
            let block = inner
                .staged
                .get(&key)
                .and_then(|blocks| blocks.get(block_id))
                .ok_or_else(|| {
                    GatewayError::fatal(format!("unknown or expired block: {block_id}"))
                })?;
            data.extend_from_slice(block);
        }
        inner.staged.remove(&key);

        inner.committed.insert(
            key.clone(),
            CommittedObject {
                data,
                content_type: content_type.to_string(),
            },
        );

        Ok(PublicReference::new(format!("memory://{key}")))
    }

    async fn ensure_container_exists(&self, container: &str) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock();
        inner.operations.push("ensure_container_exists");
        inner.containers.insert(container.to_string());
        Ok(())
    }

    async fn set_public_access(
        &self,
        container: &str,
        policy: AccessPolicy,
    ) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock();
        inner.operations.push("set_public_access");
        inner.policies.insert(container.to_string(), policy);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> UploadTarget {
        UploadTarget::new("bucket", "object.bin")
    }

    #[tokio::test]
    async fn commit_assembles_blocks_in_manifest_order() {
        let gateway = MemoryGateway::new();
        let target = target();
        let first = BlockId::new();
        let second = BlockId::new();

        // Staged out of order; the manifest decides assembly order
        gateway
            .stage_block(&target, &second, Bytes::from_static(b"world"), Duration::ZERO)
            .await
            .unwrap();
        gateway
            .stage_block(&target, &first, Bytes::from_static(b"hello "), Duration::ZERO)
            .await
            .unwrap();

        let reference = gateway
            .commit_block_list(
                &target,
                &[first, second],
                "text/plain",
                Duration::ZERO,
            )
            .await
            .unwrap();

        assert_eq!(reference.as_str(), "memory://bucket/object.bin");
        assert_eq!(
            gateway.committed_object(&target).unwrap(),
            b"hello world".to_vec()
        );
        assert_eq!(
            gateway.committed_content_type(&target).unwrap(),
            "text/plain"
        );
    }

    #[tokio::test]
    async fn second_commit_of_same_object_is_rejected() {
        let gateway = MemoryGateway::new();
        let target = target();
        let id = BlockId::new();

        gateway
            .stage_block(&target, &id, Bytes::from_static(b"x"), Duration::ZERO)
            .await
            .unwrap();
        gateway
            .commit_block_list(&target, &[id.clone()], "text/plain", Duration::ZERO)
            .await
            .unwrap();

        let err = gateway
            .commit_block_list(&target, &[id], "text/plain", Duration::ZERO)
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        // The first committed object is untouched
        assert_eq!(gateway.committed_object(&target).unwrap(), b"x".to_vec());
    }

    #[tokio::test]
    async fn commit_with_unknown_block_fails_and_keeps_staged_blocks() {
        let gateway = MemoryGateway::new();
        let target = target();
        let staged = BlockId::new();

        gateway
            .stage_block(&target, &staged, Bytes::from_static(b"x"), Duration::ZERO)
            .await
            .unwrap();

        let err = gateway
            .commit_block_list(
                &target,
                &[staged, BlockId::new()],
                "text/plain",
                Duration::ZERO,
            )
            .await
            .unwrap_err();

        assert!(err.message().contains("unknown or expired block"));
        // The rejected commit must not consume the staged set
        assert_eq!(gateway.staged_block_count(&target), 1);
        assert!(gateway.committed_object(&target).is_none());
    }

    #[tokio::test]
    async fn ensure_container_is_idempotent() {
        let gateway = MemoryGateway::new();
        gateway.ensure_container_exists("media").await.unwrap();
        gateway.ensure_container_exists("media").await.unwrap();
        assert!(gateway.has_container("media"));
    }
}
