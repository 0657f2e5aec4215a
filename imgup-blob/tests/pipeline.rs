use std::collections::HashSet;
use std::io::Cursor;

use bytes::Bytes;
use futures::Stream;
use imgup_blob::{
    BlobConfig, BlobError, ContainerUrl, Fault, IdPolicy, ListingService, MemoryStore, ObjectId, ObjectStore,
    UploadMethod, UploadPipeline, UploadRules,
};
use tempfile::TempDir;

const MIB: usize = 1024 * 1024;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn body(data: &[u8], chunk: usize) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send {
    let chunks: Vec<_> = data
        .chunks(chunk.max(1))
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    futures::stream::iter(chunks)
}

fn staging_is_empty(dir: &TempDir) -> bool {
    std::fs::read_dir(dir.path()).unwrap().next().is_none()
}

fn pipeline(memory: &MemoryStore, staging: &TempDir, rules: UploadRules) -> UploadPipeline {
    let config = BlobConfig::new()
        .with_upload_rules(rules)
        .with_staging_dir(staging.path());
    UploadPipeline::new(ObjectStore::new(memory.clone()), &config)
}

fn listing(memory: &MemoryStore) -> ListingService {
    ListingService::new(
        ObjectStore::new(memory.clone()),
        ContainerUrl::parse("https://media.example.com/imgup").unwrap(),
    )
}

#[tokio::test]
async fn provisioning_is_idempotent() {
    let memory = MemoryStore::new("imgup");
    let store = ObjectStore::new(memory.clone());

    for _ in 0..3 {
        store.ensure_container().await.unwrap();
    }
    assert!(memory.container_exists());
    assert_eq!(memory.stats().containers_created, 1);
}

#[tokio::test]
async fn provisioning_failures_propagate() {
    let memory = MemoryStore::new("imgup");
    memory.inject(Fault::Provision);

    let err = ObjectStore::new(memory.clone()).ensure_container().await.unwrap_err();
    assert!(matches!(err, BlobError::Provision { ref container, .. } if container == "imgup"));
}

#[tokio::test]
async fn provisioning_failure_fails_the_upload() {
    let staging = TempDir::new().unwrap();
    let memory = MemoryStore::new("imgup");
    memory.inject(Fault::Provision);

    let err = pipeline(&memory, &staging, UploadRules::default())
        .handle(None, body(b"hello", 2))
        .await
        .unwrap_err();

    assert!(matches!(err, BlobError::Provision { .. }));
    assert!(memory.keys().is_empty());
    assert!(staging_is_empty(&staging));
}

#[tokio::test]
async fn upload_round_trip_is_byte_exact() {
    let staging = TempDir::new().unwrap();
    let memory = MemoryStore::new("imgup");
    let data = payload(50_000);

    let receipt = pipeline(&memory, &staging, UploadRules::new().with_block_size(4096).with_parallelism(3))
        .handle(Some("image/png"), body(&data, 1000))
        .await
        .unwrap();

    let stored = ObjectStore::new(memory.clone()).get(&receipt.id).await.unwrap();
    assert_eq!(stored.as_ref(), data.as_slice());
    assert_eq!(receipt.size_bytes, data.len() as u64);
    assert_eq!(memory.content_type(receipt.id.as_str()).as_deref(), Some("image/png"));
}

#[tokio::test]
async fn chunking_is_invisible_to_readers() {
    let memory = MemoryStore::new("imgup");
    let store = ObjectStore::new(memory.clone());
    store.ensure_container().await.unwrap();

    let mut n = 0;
    for size in [0usize, 1, 1023, 1024, 1025, 4096, 10_000] {
        for block_size in [1024u64, 4096] {
            for parallelism in [1usize, 2, 16] {
                n += 1;
                let id = ObjectId::parse(format!("obj{}", n)).unwrap();
                let data = payload(size);
                let rules = UploadRules::new()
                    .with_block_size(block_size)
                    .with_parallelism(parallelism);

                let receipt = store
                    .put_large(&id, None, Cursor::new(data.clone()), &rules)
                    .await
                    .unwrap();

                assert_eq!(store.get(&id).await.unwrap().as_ref(), data.as_slice());
                if (size as u64) < block_size {
                    assert_eq!(receipt.upload, UploadMethod::Single);
                } else {
                    let blocks = (size as u64).div_ceil(block_size) as u32;
                    assert_eq!(receipt.upload, UploadMethod::Blocks { block_size, blocks });
                }
            }
        }
    }
}

#[tokio::test]
async fn ten_mib_upload_uses_three_blocks_and_one_commit() {
    let staging = TempDir::new().unwrap();
    let memory = MemoryStore::new("imgup");
    let data = payload(10 * MIB);

    let receipt = pipeline(&memory, &staging, UploadRules::default())
        .handle(Some("image/jpeg"), body(&data, 64 * 1024))
        .await
        .unwrap();

    assert_eq!(
        receipt.upload,
        UploadMethod::Blocks {
            block_size: 4 * MIB as u64,
            blocks: 3
        }
    );
    let stats = memory.stats();
    assert_eq!(stats.blocks_put, 3);
    assert_eq!(stats.commits, 1);
    assert_eq!(stats.single_puts, 0);

    let recent = listing(&memory).recent().await.unwrap();
    assert!(recent.iter().any(|o| o.id == receipt.id));
    assert!(staging_is_empty(&staging));
}

#[tokio::test]
async fn block_size_is_raised_to_the_backend_minimum() {
    let memory = MemoryStore::new("imgup").with_min_block_size(4096);
    let store = ObjectStore::new(memory.clone());
    store.ensure_container().await.unwrap();

    let id = ObjectId::parse("clamped").unwrap();
    let data = payload(10_000);
    let rules = UploadRules::new().with_block_size(1024).with_parallelism(4);
    let receipt = store.put_large(&id, None, Cursor::new(data.clone()), &rules).await.unwrap();

    assert_eq!(receipt.upload, UploadMethod::Blocks { block_size: 4096, blocks: 3 });
    assert_eq!(store.get(&id).await.unwrap().as_ref(), data.as_slice());
}

#[tokio::test]
async fn block_transfers_respect_the_parallelism_bound() {
    let memory = MemoryStore::new("imgup").with_block_yields(4);
    let store = ObjectStore::new(memory.clone());
    store.ensure_container().await.unwrap();

    let id = ObjectId::parse("wide").unwrap();
    let rules = UploadRules::new().with_block_size(1024).with_parallelism(4);
    store
        .put_large(&id, None, Cursor::new(payload(20 * 1024)), &rules)
        .await
        .unwrap();

    let stats = memory.stats();
    assert_eq!(stats.blocks_put, 20);
    assert!(stats.max_blocks_in_flight <= 4, "peak was {}", stats.max_blocks_in_flight);
    assert!(stats.max_blocks_in_flight > 1, "blocks never overlapped");
}

#[tokio::test]
async fn failed_block_aborts_and_releases_staging() {
    let staging = TempDir::new().unwrap();
    let memory = MemoryStore::new("imgup");
    memory.inject(Fault::Block(2));

    let err = pipeline(&memory, &staging, UploadRules::new().with_block_size(1024).with_parallelism(2))
        .handle(None, body(&payload(8 * 1024), 500))
        .await
        .unwrap_err();

    assert!(matches!(err, BlobError::Upload { .. }));
    assert!(memory.keys().is_empty());
    assert_eq!(memory.pending_uploads(), 0);
    assert_eq!(memory.stats().aborts, 1);
    assert!(staging_is_empty(&staging));
}

#[tokio::test]
async fn failed_single_put_releases_staging() {
    let staging = TempDir::new().unwrap();
    let memory = MemoryStore::new("imgup");
    memory.inject(Fault::Put);

    let err = pipeline(&memory, &staging, UploadRules::default())
        .handle(None, body(b"tiny", 4))
        .await
        .unwrap_err();

    assert!(matches!(err, BlobError::Upload { .. }));
    assert!(staging_is_empty(&staging));
}

#[tokio::test]
async fn broken_request_body_is_a_validation_error() {
    let staging = TempDir::new().unwrap();
    let memory = MemoryStore::new("imgup");
    let chunks = vec![
        Ok(Bytes::from_static(b"partial")),
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "client went away")),
    ];

    let err = pipeline(&memory, &staging, UploadRules::default())
        .handle(None, futures::stream::iter(chunks))
        .await
        .unwrap_err();

    assert!(matches!(err, BlobError::Invalid { .. }));
    assert!(!memory.container_exists());
    assert!(staging_is_empty(&staging));
}

#[tokio::test]
async fn listing_is_complete_across_pages() {
    let memory = MemoryStore::new("imgup").with_page_size(3);
    let store = ObjectStore::new(memory.clone());
    store.ensure_container().await.unwrap();

    let mut expected = Vec::new();
    for i in 0..10 {
        let id = ObjectId::parse(format!("img{:02}", i)).unwrap();
        store
            .put_large(&id, None, Cursor::new(vec![i as u8]), &UploadRules::default())
            .await
            .unwrap();
        expected.push(id);
    }

    let recent = listing(&memory).recent().await.unwrap();
    let ids: Vec<_> = recent.iter().map(|o| o.id.clone()).collect();
    assert_eq!(ids, expected);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 10);
    assert_eq!(recent[0].url, "https://media.example.com/imgup/img00");
    assert_eq!(memory.stats().list_calls, 4);
}

#[tokio::test]
async fn listing_walks_restart_from_the_beginning() {
    let memory = MemoryStore::new("imgup").with_page_size(2);
    let service = listing(&memory);
    let store = ObjectStore::new(memory.clone());
    store.ensure_container().await.unwrap();
    for key in ["a", "b", "c"] {
        store
            .put_large(&ObjectId::parse(key).unwrap(), None, Cursor::new(b"x".to_vec()), &UploadRules::default())
            .await
            .unwrap();
    }

    let first = service.recent().await.unwrap();
    let second = service.recent().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[tokio::test]
async fn listing_failure_returns_no_partial_result() {
    let memory = MemoryStore::new("imgup").with_page_size(2);
    let store = ObjectStore::new(memory.clone());
    store.ensure_container().await.unwrap();
    for i in 0..5 {
        let id = ObjectId::parse(format!("k{}", i)).unwrap();
        store
            .put_large(&id, None, Cursor::new(vec![0u8]), &UploadRules::default())
            .await
            .unwrap();
    }
    memory.inject(Fault::ListAfter(1));

    let err = listing(&memory).recent().await.unwrap_err();
    assert!(matches!(err, BlobError::List { .. }));
}

#[tokio::test]
async fn fresh_container_lists_empty() {
    let memory = MemoryStore::new("imgup");
    let recent = listing(&memory).recent().await.unwrap();
    assert!(recent.is_empty());
    assert!(memory.container_exists());
}

#[tokio::test]
async fn pipeline_identifiers_are_path_safe() {
    let staging = TempDir::new().unwrap();
    let memory = MemoryStore::new("imgup");

    for policy in [IdPolicy::default(), IdPolicy::Numeric] {
        let config = BlobConfig::new()
            .with_id_policy(policy)
            .with_staging_dir(staging.path());
        let pipeline = UploadPipeline::new(ObjectStore::new(memory.clone()), &config);

        let receipt = pipeline.handle(None, body(b"abc", 3)).await.unwrap();
        let id = receipt.id.as_str();
        assert!(!id.contains('/'));
        assert!(!id.chars().any(char::is_whitespace));
        match policy {
            IdPolicy::Alphanumeric { length } => {
                assert_eq!(id.len(), length);
                assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
            }
            IdPolicy::Numeric => {
                id.parse::<u64>().unwrap();
            }
        }
    }
}

#[tokio::test]
async fn concurrent_uploads_use_distinct_staging_files() {
    let staging = TempDir::new().unwrap();
    let memory = MemoryStore::new("imgup");
    let pipeline = pipeline(&memory, &staging, UploadRules::new().with_block_size(1024).with_parallelism(4));

    let uploads = (0..8).map(|i| {
        let pipeline = pipeline.clone();
        let data = payload(3000 + i);
        async move { pipeline.handle(None, body(&data, 700)).await.map(|r| (r, data)) }
    });
    let results = futures::future::join_all(uploads).await;

    for result in results {
        let (receipt, data) = result.unwrap();
        let stored = ObjectStore::new(memory.clone()).get(&receipt.id).await.unwrap();
        assert_eq!(stored.as_ref(), data.as_slice());
    }
    assert!(staging_is_empty(&staging));
}
