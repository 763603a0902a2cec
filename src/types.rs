use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a staged block.
///
/// Generated once per block and reused across retry attempts; uniqueness
/// within one upload session is by construction (random v4 uuid), not
/// checked at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub String);

impl BlockId {
    /// Generate a new random block ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from existing string
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One fixed-size segment of the source file, the unit of network transfer.
/// Immutable once read; every block is full-size except possibly the last.
#[derive(Debug, Clone)]
pub struct Block {
    /// 0-based position within the source file
    pub index: u64,
    pub data: Bytes,
}

impl Block {
    pub fn new(index: u64, data: Bytes) -> Self {
        Self { index, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Confirmation that a block was successfully staged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRecord {
    pub block_id: BlockId,
    pub index: u64,
    pub size_bytes: u64,
}

/// The ordered block list that defines final object reconstruction order
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    records: Vec<BlockRecord>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a confirmed record. Records may arrive in any completion
    /// order; call `sort_by_index` before commit.
    pub fn push(&mut self, record: BlockRecord) {
        self.records.push(record);
    }

    /// Sort records into file order
    pub fn sort_by_index(&mut self) {
        self.records.sort_by_key(|r| r.index);
    }

    /// Verify the manifest is gap-free and duplicate-free. Must be called
    /// on a sorted manifest; commit must never be attempted otherwise.
    pub fn validate(&self) -> Result<(), String> {
        for (expected, record) in self.records.iter().enumerate() {
            let expected = expected as u64;
            if record.index != expected {
                return Err(if record.index < expected {
                    format!("duplicate block index {}", record.index)
                } else {
                    format!("missing block index {expected}")
                });
            }
        }
        Ok(())
    }

    /// Block ids in manifest order
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.records.iter().map(|r| r.block_id.clone()).collect()
    }

    pub fn records(&self) -> &[BlockRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Destination of an upload: container plus object name and content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub container: String,
    pub object_name: String,
    pub content_type: String,
}

impl UploadTarget {
    pub fn new<C: Into<String>, O: Into<String>>(container: C, object_name: O) -> Self {
        Self {
            container: container.into(),
            object_name: object_name.into(),
            content_type: "application/octet-stream".to_string(),
        }
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// Reference for locating a committed object (e.g. a public URL)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicReference(pub String);

impl PublicReference {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PublicReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Emitted after each successfully staged block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Index of the block that just completed
    pub index: u64,
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
}

impl ProgressEvent {
    /// Completed fraction in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.bytes_uploaded as f64 / self.total_bytes as f64
        }
    }
}

/// Transient state spanning one file's upload. In-memory only; discarded on
/// completion or failure, never persisted.
#[derive(Debug)]
pub struct UploadSession {
    total_bytes: u64,
    bytes_uploaded: u64,
    manifest: Manifest,
}

impl UploadSession {
    pub fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            bytes_uploaded: 0,
            manifest: Manifest::new(),
        }
    }

    /// Fold a confirmed record into the session and report progress.
    /// `bytes_uploaded` is monotonically non-decreasing.
    pub fn record(&mut self, record: BlockRecord) -> ProgressEvent {
        self.bytes_uploaded += record.size_bytes;
        let event = ProgressEvent {
            index: record.index,
            bytes_uploaded: self.bytes_uploaded,
            total_bytes: self.total_bytes,
        };
        self.manifest.push(record);
        event
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes_uploaded
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Consume the session, yielding the manifest for commit
    pub fn into_manifest(self) -> Manifest {
        self.manifest
    }
}
