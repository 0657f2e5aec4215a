use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

use crate::{
    BlobError, BlobResult, BlobStore, BlockReceipt, BlockUpload, ListPage, Marker, PutResult, StoreCapabilities,
    StoredObjectSummary,
};

/// Failures the in-memory store can be told to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `create_container` fails with something other than "already exists"
    Provision,
    /// Staging the block with this index fails
    Block(u32),
    /// Single-request puts fail
    Put,
    /// Committing a block upload fails
    Commit,
    /// Listing fails once this many pages have been served
    ListAfter(usize),
}

/// Counters for what reached the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub containers_created: usize,
    pub single_puts: usize,
    pub blocks_put: usize,
    pub commits: usize,
    pub aborts: usize,
    pub list_calls: usize,
    pub max_blocks_in_flight: usize,
}

#[derive(Debug)]
struct StoredEntry {
    body: Bytes,
    content_type: Option<String>,
    modified: i64,
}

#[derive(Debug)]
struct PendingUpload {
    key: String,
    content_type: Option<String>,
    blocks: BTreeMap<u32, Bytes>,
}

#[derive(Debug)]
struct State {
    exists: bool,
    objects: Vec<(String, StoredEntry)>,
    pending: HashMap<String, PendingUpload>,
    faults: Vec<Fault>,
    stats: TransferStats,
    page_size: usize,
    min_block_size: Option<u64>,
    block_yields: usize,
    next_upload: u64,
}

#[derive(Debug)]
struct Inner {
    container: String,
    state: Mutex<State>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// In-process [`BlobStore`] with the same contracts as the remote backend.
///
/// Objects list in insertion order; rewriting a key keeps its position.
/// Staged blocks stay invisible until committed. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub const DEFAULT_PAGE_SIZE: usize = 1000;

    pub fn new<S: Into<String>>(container: S) -> Self {
        Self {
            inner: Arc::new(Inner {
                container: container.into(),
                state: Mutex::new(State {
                    exists: false,
                    objects: Vec::new(),
                    pending: HashMap::new(),
                    faults: Vec::new(),
                    stats: TransferStats::default(),
                    page_size: Self::DEFAULT_PAGE_SIZE,
                    min_block_size: None,
                    block_yields: 0,
                    next_upload: 0,
                }),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Objects per listing page
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.inner.state.lock().page_size = page_size.max(1);
        self
    }

    /// Reject non-final blocks smaller than `bytes` at commit
    pub fn with_min_block_size(self, bytes: u64) -> Self {
        self.inner.state.lock().min_block_size = Some(bytes);
        self
    }

    /// Yield to the runtime this many times inside each block transfer.
    ///
    /// Off by default. Tests turn it on so concurrent transfers overlap and
    /// `TransferStats::max_blocks_in_flight` reflects the parallelism bound.
    pub fn with_block_yields(self, yields: usize) -> Self {
        self.inner.state.lock().block_yields = yields;
        self
    }

    pub fn inject(&self, fault: Fault) {
        self.inner.state.lock().faults.push(fault);
    }

    pub fn clear_faults(&self) {
        self.inner.state.lock().faults.clear();
    }

    pub fn stats(&self) -> TransferStats {
        let mut stats = self.inner.state.lock().stats.clone();
        stats.max_blocks_in_flight = self.inner.peak_in_flight.load(Ordering::SeqCst);
        stats
    }

    pub fn container_exists(&self) -> bool {
        self.inner.state.lock().exists
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .objects
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        let state = self.inner.state.lock();
        state
            .objects
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, entry)| entry.content_type.clone())
    }

    /// Block uploads begun but neither committed nor aborted
    pub fn pending_uploads(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    fn has_fault(state: &State, wanted: impl Fn(&Fault) -> bool) -> bool {
        state.faults.iter().any(wanted)
    }

    fn require_container(&self, state: &State) -> BlobResult<()> {
        if state.exists {
            Ok(())
        } else {
            Err(BlobError::not_found(self.inner.container.clone()))
        }
    }

    fn store_object(state: &mut State, key: &str, body: Bytes, content_type: Option<String>) {
        let entry = StoredEntry {
            body,
            content_type,
            modified: chrono::Utc::now().timestamp(),
        };
        match state.objects.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = entry,
            None => state.objects.push((key.to_string(), entry)),
        }
    }

    fn stage_block(&self, upload: &BlockUpload, index: u32, body: Bytes) -> BlobResult<BlockReceipt> {
        let mut state = self.inner.state.lock();
        if Self::has_fault(&state, |f| *f == Fault::Block(index)) {
            return Err(BlobError::backend_message(format!("injected failure for block {}", index)));
        }
        let size_bytes = body.len() as u64;
        let pending = state
            .pending
            .get_mut(&upload.upload_id)
            .ok_or_else(|| BlobError::not_found(format!("upload {}", upload.upload_id)))?;
        pending.blocks.insert(index, body);
        state.stats.blocks_put += 1;

        Ok(BlockReceipt {
            index,
            tag: format!("{}-{}", upload.upload_id, index),
            size_bytes,
        })
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    fn container(&self) -> &str {
        &self.inner.container
    }

    async fn create_container(&self) -> BlobResult<()> {
        let mut state = self.inner.state.lock();
        if Self::has_fault(&state, |f| *f == Fault::Provision) {
            return Err(BlobError::backend_message("injected provisioning failure"));
        }
        if state.exists {
            return Err(BlobError::already_exists(self.inner.container.clone()));
        }
        state.exists = true;
        state.stats.containers_created += 1;
        Ok(())
    }

    async fn put(&self, key: &str, content_type: Option<&str>, body: Bytes) -> BlobResult<PutResult> {
        let mut state = self.inner.state.lock();
        self.require_container(&state)?;
        if Self::has_fault(&state, |f| *f == Fault::Put) {
            return Err(BlobError::backend_message("injected put failure"));
        }
        let size_bytes = body.len() as u64;
        Self::store_object(&mut state, key, body, content_type.map(str::to_string));
        state.stats.single_puts += 1;

        Ok(PutResult {
            etag: Some(format!("single-{}", state.stats.single_puts)),
            size_bytes,
        })
    }

    async fn begin_blocks(&self, key: &str, content_type: Option<&str>) -> BlobResult<BlockUpload> {
        let mut state = self.inner.state.lock();
        self.require_container(&state)?;
        state.next_upload += 1;
        let upload_id = format!("upload-{}", state.next_upload);
        state.pending.insert(
            upload_id.clone(),
            PendingUpload {
                key: key.to_string(),
                content_type: content_type.map(str::to_string),
                blocks: BTreeMap::new(),
            },
        );

        Ok(BlockUpload {
            key: key.to_string(),
            upload_id,
        })
    }

    async fn put_block(&self, upload: &BlockUpload, index: u32, body: Bytes) -> BlobResult<BlockReceipt> {
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let yields = self.inner.state.lock().block_yields;
        for _ in 0..yields {
            tokio::task::yield_now().await;
        }

        let result = self.stage_block(upload, index, body);
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn commit_blocks(&self, upload: &BlockUpload, blocks: Vec<BlockReceipt>) -> BlobResult<PutResult> {
        let mut state = self.inner.state.lock();
        if Self::has_fault(&state, |f| *f == Fault::Commit) {
            return Err(BlobError::backend_message("injected commit failure"));
        }
        let min_block_size = state.min_block_size;
        let pending = state
            .pending
            .remove(&upload.upload_id)
            .ok_or_else(|| BlobError::not_found(format!("upload {}", upload.upload_id)))?;

        let mut body = BytesMut::new();
        let last = blocks.len().saturating_sub(1);
        for (position, receipt) in blocks.iter().enumerate() {
            let block = pending
                .blocks
                .get(&receipt.index)
                .ok_or_else(|| BlobError::invalid(format!("block {} was never staged", receipt.index)))?;
            if let Some(min) = min_block_size {
                if position != last && (block.len() as u64) < min {
                    return Err(BlobError::invalid(format!(
                        "block {} is {} bytes, below the {} byte minimum",
                        receipt.index,
                        block.len(),
                        min
                    )));
                }
            }
            body.extend_from_slice(block);
        }

        let size_bytes = body.len() as u64;
        Self::store_object(&mut state, &pending.key, body.freeze(), pending.content_type);
        state.stats.commits += 1;

        Ok(PutResult {
            etag: Some(format!("{}-{}", upload.upload_id, blocks.len())),
            size_bytes,
        })
    }

    async fn abort_blocks(&self, upload: &BlockUpload) -> BlobResult<()> {
        let mut state = self.inner.state.lock();
        state.pending.remove(&upload.upload_id);
        state.stats.aborts += 1;
        Ok(())
    }

    async fn list_page(&self, marker: &Marker) -> BlobResult<ListPage> {
        let mut state = self.inner.state.lock();
        self.require_container(&state)?;
        let served = state.stats.list_calls;
        if Self::has_fault(&state, |f| matches!(f, Fault::ListAfter(n) if served >= *n)) {
            return Err(BlobError::backend_message("injected listing failure"));
        }
        state.stats.list_calls += 1;

        let start = match marker {
            Marker::Start => 0,
            Marker::Next(token) => token
                .parse::<usize>()
                .map_err(|_| BlobError::invalid(format!("bad continuation token {:?}", token)))?,
            Marker::Done => return Err(BlobError::invalid("listing already finished")),
        };
        let end = (start + state.page_size).min(state.objects.len());
        let objects = state.objects[start.min(end)..end]
            .iter()
            .map(|(key, entry)| StoredObjectSummary {
                key: key.clone(),
                size_bytes: entry.body.len() as u64,
                last_modified: Some(entry.modified),
            })
            .collect();
        let next = if end < state.objects.len() {
            Marker::Next(end.to_string())
        } else {
            Marker::Done
        };

        Ok(ListPage { objects, next })
    }

    async fn get(&self, key: &str) -> BlobResult<Bytes> {
        let state = self.inner.state.lock();
        state
            .objects
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, entry)| entry.body.clone())
            .ok_or_else(|| BlobError::not_found(key))
    }

    fn capabilities(&self) -> StoreCapabilities {
        let min_block_size = self.inner.state.lock().min_block_size;
        StoreCapabilities::basic().with_block_limits(min_block_size, None)
    }
}
