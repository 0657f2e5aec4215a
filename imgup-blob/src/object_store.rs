use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::{JoinError, JoinSet};

use crate::receipt::UploadMethod;
use crate::{
    BlobError, BlobResult, BlobStore, BlockReceipt, Marker, ObjectId, PutReceipt, StoredObjectSummary,
    UploadRules,
};

/// Container-level operations on top of a [`BlobStore`].
///
/// This is the seam the upload pipeline and the listing service share:
/// idempotent provisioning, chunked parallel writes and a complete walk of
/// the paginated listing.
#[derive(Clone)]
pub struct ObjectStore {
    store: Arc<dyn BlobStore>,
}

impl ObjectStore {
    pub fn new<S: BlobStore + 'static>(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn from_arc(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    pub fn container(&self) -> &str {
        self.store.container()
    }

    /// Make sure the container exists. Safe to call any number of times.
    #[tracing::instrument(skip(self), fields(container = %self.store.container()))]
    pub async fn ensure_container(&self) -> BlobResult<()> {
        let container = self.store.container();
        match self.store.create_container().await {
            Ok(()) => {
                tracing::info!(container, "created container");
                Ok(())
            }
            Err(BlobError::ContainerAlreadyExists { .. }) => {
                tracing::debug!(container, "container already exists");
                Ok(())
            }
            Err(e) => {
                tracing::error!(container, error = %e, "container provisioning failed");
                Err(BlobError::provision(container, e))
            }
        }
    }

    /// Write everything `source` yields under `id`.
    ///
    /// Inputs shorter than one block go up in a single request. Larger inputs
    /// are cut into blocks of `rules.block_size` (raised to the backend
    /// minimum), with at most `rules.parallelism` block transfers in flight,
    /// and become visible only when the commit succeeds.
    #[tracing::instrument(skip(self, source, rules), fields(key = %id))]
    pub async fn put_large<R>(
        &self,
        id: &ObjectId,
        content_type: Option<&str>,
        mut source: R,
        rules: &UploadRules,
    ) -> BlobResult<PutReceipt>
    where
        R: AsyncRead + Unpin + Send,
    {
        if rules.block_size == 0 || rules.parallelism == 0 {
            return Err(BlobError::invalid("Block size and parallelism must be positive"));
        }

        let key = id.as_str();
        let caps = self.store.capabilities();
        let block_size = rules.block_size.max(caps.min_block_size.unwrap_or(0));

        let first = read_block(&mut source, block_size).await?;
        if (first.len() as u64) < block_size {
            let size = first.len() as u64;
            let result = self
                .store
                .put(key, content_type, first)
                .await
                .map_err(|e| BlobError::upload(key, e))?;
            tracing::debug!(key, size, "stored object in a single request");
            return Ok(PutReceipt::new(id.clone(), result.size_bytes, UploadMethod::Single)
                .with_content_type(content_type)
                .with_etag(result.etag));
        }

        let upload = self
            .store
            .begin_blocks(key, content_type)
            .await
            .map_err(|e| BlobError::upload(key, e))?;

        let mut tasks: JoinSet<BlobResult<BlockReceipt>> = JoinSet::new();
        let mut receipts = Vec::new();
        let mut failure: Option<BlobError> = None;
        let mut next = Some(first);
        let mut index: u32 = 0;

        'blocks: loop {
            let block = match next.take() {
                Some(block) => block,
                None => match read_block(&mut source, block_size).await {
                    Ok(block) => block,
                    Err(e) => {
                        failure = Some(e.into());
                        break;
                    }
                },
            };
            if block.is_empty() {
                break;
            }
            if let Some(max) = caps.max_blocks {
                if index >= max {
                    failure = Some(BlobError::invalid(format!(
                        "Object needs more than {} blocks of {} bytes",
                        max, block_size
                    )));
                    break;
                }
            }

            while tasks.len() >= rules.parallelism {
                match tasks.join_next().await {
                    Some(joined) => settle(key, joined, &mut receipts, &mut failure),
                    None => break,
                }
                if failure.is_some() {
                    break 'blocks;
                }
            }

            let last = (block.len() as u64) < block_size;
            let store = self.store.clone();
            let handle = upload.clone();
            tasks.spawn(async move { store.put_block(&handle, index, block).await });
            index += 1;

            if last {
                break;
            }
        }

        // Even after a failure, every transfer already started is awaited.
        while let Some(joined) = tasks.join_next().await {
            settle(key, joined, &mut receipts, &mut failure);
        }

        if let Some(e) = failure {
            self.abort(&upload).await;
            return Err(e);
        }

        receipts.sort_by_key(|r| r.index);
        let blocks = receipts.len() as u32;
        let result = match self.store.commit_blocks(&upload, receipts).await {
            Ok(result) => result,
            Err(e) => {
                self.abort(&upload).await;
                return Err(BlobError::upload(key, e));
            }
        };

        tracing::debug!(key, blocks, block_size, size = result.size_bytes, "committed block upload");
        Ok(PutReceipt::new(id.clone(), result.size_bytes, UploadMethod::Blocks { block_size, blocks })
            .with_content_type(content_type)
            .with_etag(result.etag))
    }

    /// Every object in the container, across all listing pages.
    ///
    /// Lazy: nothing is requested until polled, and each call starts a fresh walk.
    pub fn list_all(&self) -> impl Stream<Item = BlobResult<StoredObjectSummary>> + Send + 'static {
        let store = self.store.clone();
        async_stream::try_stream! {
            let mut marker = Marker::Start;
            while !marker.is_done() {
                let page = store.list_page(&marker).await.map_err(BlobError::list)?;
                for object in page.objects {
                    yield object;
                }
                marker = page.next;
            }
        }
    }

    /// Read a whole object back
    pub async fn get(&self, id: &ObjectId) -> BlobResult<Bytes> {
        self.store.get(id.as_str()).await
    }

    async fn abort(&self, upload: &crate::BlockUpload) {
        if let Err(e) = self.store.abort_blocks(upload).await {
            tracing::warn!(key = %upload.key, error = %e, "failed to abort block upload");
        }
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("container", &self.store.container())
            .finish()
    }
}

fn settle(
    key: &str,
    joined: Result<BlobResult<BlockReceipt>, JoinError>,
    receipts: &mut Vec<BlockReceipt>,
    failure: &mut Option<BlobError>,
) {
    let outcome = joined
        .map_err(BlobError::backend)
        .and_then(|result| result);
    match outcome {
        Ok(receipt) => receipts.push(receipt),
        Err(e) => {
            if failure.is_none() {
                *failure = Some(BlobError::upload(key, e));
            }
        }
    }
}

/// Read up to `size` bytes; a short result means the source is exhausted
async fn read_block<R>(source: &mut R, size: u64) -> std::io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(size.min(8 * 1024 * 1024) as usize);
    (&mut *source).take(size).read_to_end(&mut buf).await?;
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_block_stops_at_size_and_at_eof() {
        let data = vec![7u8; 10];
        let mut source = std::io::Cursor::new(data);

        assert_eq!(read_block(&mut source, 4).await.unwrap().len(), 4);
        assert_eq!(read_block(&mut source, 4).await.unwrap().len(), 4);
        assert_eq!(read_block(&mut source, 4).await.unwrap().len(), 2);
        assert!(read_block(&mut source, 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn existing_container_is_not_an_error() {
        let store = ObjectStore::new(crate::MemoryStore::new("imgup"));
        store.ensure_container().await.unwrap();
        store.ensure_container().await.unwrap();

        assert!(logs_contain("created container"));
        assert!(logs_contain("container already exists"));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn commit_failure_aborts_the_upload() {
        let memory = crate::MemoryStore::new("imgup");
        let store = ObjectStore::new(memory.clone());
        store.ensure_container().await.unwrap();
        memory.inject(crate::Fault::Commit);

        let rules = UploadRules::new().with_block_size(4).with_parallelism(2);
        let id = ObjectId::parse("abc123").unwrap();
        let err = store
            .put_large(&id, None, std::io::Cursor::new(vec![1u8; 10]), &rules)
            .await
            .unwrap_err();

        assert!(matches!(err, BlobError::Upload { .. }));
        assert_eq!(memory.stats().aborts, 1);
        assert!(!logs_contain("failed to abort block upload"));
    }
}
