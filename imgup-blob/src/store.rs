use async_trait::async_trait;
use bytes::Bytes;

use crate::BlobResult;

/// Storage primitives every backend implements.
///
/// Coordination (identifier choice, block splitting, parallelism, listing
/// walks) lives in [`crate::ObjectStore`]; backends only move bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Name of the container this store writes into
    fn container(&self) -> &str;

    /// Create the container with no anonymous access.
    ///
    /// Returns [`crate::BlobError::ContainerAlreadyExists`] when it is already
    /// provisioned for this account.
    async fn create_container(&self) -> BlobResult<()>;

    /// Store an object in one request
    async fn put(&self, key: &str, content_type: Option<&str>, body: Bytes) -> BlobResult<PutResult>;

    /// Start a block upload. Nothing is visible under `key` until commit.
    async fn begin_blocks(&self, key: &str, content_type: Option<&str>) -> BlobResult<BlockUpload>;

    /// Stage block `index` (zero based)
    async fn put_block(&self, upload: &BlockUpload, index: u32, body: Bytes) -> BlobResult<BlockReceipt>;

    /// Publish the staged blocks, ordered by index, as the object
    async fn commit_blocks(&self, upload: &BlockUpload, blocks: Vec<BlockReceipt>) -> BlobResult<PutResult>;

    /// Discard staged blocks
    async fn abort_blocks(&self, upload: &BlockUpload) -> BlobResult<()>;

    /// Fetch one page of the container listing starting at `marker`
    async fn list_page(&self, marker: &Marker) -> BlobResult<ListPage>;

    /// Read a whole object
    async fn get(&self, key: &str) -> BlobResult<Bytes>;

    fn capabilities(&self) -> StoreCapabilities;
}

/// Result of a successful put or commit
#[derive(Debug, Clone)]
pub struct PutResult {
    pub etag: Option<String>,
    pub size_bytes: u64,
}

/// Handle for an in-progress block upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockUpload {
    pub key: String,
    pub upload_id: String,
}

/// Proof that one block was staged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReceipt {
    pub index: u32,
    pub tag: String,
    pub size_bytes: u64,
}

/// Position in a paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// Before the first page
    Start,
    /// Continue from a server-issued token
    Next(String),
    /// No further pages
    Done,
}

impl Marker {
    /// Build the marker that follows a page; an absent or empty token ends the walk
    pub fn from_token(token: Option<String>) -> Self {
        match token {
            Some(token) if !token.is_empty() => Self::Next(token),
            _ => Self::Done,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Next(token) => Some(token),
            _ => None,
        }
    }
}

/// One page of a container listing
#[derive(Debug, Clone)]
pub struct ListPage {
    pub objects: Vec<StoredObjectSummary>,
    pub next: Marker,
}

/// Listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObjectSummary {
    pub key: String,
    pub size_bytes: u64,
    pub last_modified: Option<i64>,
}

/// Backend limits the coordinator must respect
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreCapabilities {
    /// Smallest block the backend accepts (the final block is exempt)
    pub min_block_size: Option<u64>,
    /// Most blocks one object may have
    pub max_blocks: Option<u32>,
}

impl StoreCapabilities {
    pub fn basic() -> Self {
        Self::default()
    }

    pub fn with_block_limits(mut self, min_block_size: Option<u64>, max_blocks: Option<u32>) -> Self {
        self.min_block_size = min_block_size;
        self.max_blocks = max_blocks;
        self
    }
}
