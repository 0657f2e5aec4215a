use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use crate::{BlobConfig, BlobError, BlobResult, IdGenerator, ObjectStore, PutReceipt, UploadRules};

/// Takes one inbound upload from bytes-on-the-wire to a committed object.
///
/// Steps, each aborting the upload on failure: stage the body to a unique
/// local file, provision the container, pick an identifier, then write the
/// staged copy with [`ObjectStore::put_large`]. The staging file is removed
/// on every exit path.
#[derive(Clone)]
pub struct UploadPipeline {
    store: ObjectStore,
    ids: Arc<IdGenerator>,
    rules: UploadRules,
    staging_dir: PathBuf,
}

impl UploadPipeline {
    pub fn new(store: ObjectStore, config: &BlobConfig) -> Self {
        Self {
            store,
            ids: Arc::new(IdGenerator::new(config.id_policy)),
            rules: config.upload_rules.clone(),
            staging_dir: config.staging_dir(),
        }
    }

    /// Share an existing generator (one random source per process)
    pub fn with_id_generator(mut self, ids: Arc<IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn rules(&self) -> &UploadRules {
        &self.rules
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    #[tracing::instrument(skip(self, body))]
    pub async fn handle<S, E>(&self, content_type: Option<&str>, body: S) -> BlobResult<PutReceipt>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: std::fmt::Display + Send,
    {
        let staged = tempfile::Builder::new()
            .prefix("imgup-")
            .suffix(".upload")
            .tempfile_in(&self.staging_dir)?;
        tracing::debug!(path = %staged.path().display(), "staging upload");

        let result = self.stage_and_store(&staged, content_type, body).await;

        let path = staged.path().to_path_buf();
        if let Err(e) = staged.close() {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove staging file");
        }

        match &result {
            Ok(receipt) => tracing::info!(
                id = %receipt.id,
                size = receipt.size_bytes,
                blocks = receipt.block_count(),
                "upload stored"
            ),
            Err(e) => tracing::warn!(error = %e, "upload failed"),
        }
        result
    }

    async fn stage_and_store<S, E>(
        &self,
        staged: &NamedTempFile,
        content_type: Option<&str>,
        body: S,
    ) -> BlobResult<PutReceipt>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: std::fmt::Display + Send,
    {
        let mut file = tokio::fs::File::from_std(staged.reopen()?);
        let mut body = std::pin::pin!(body);
        let mut staged_bytes: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| BlobError::invalid(format!("Failed to read upload body: {}", e)))?;
            file.write_all(&chunk).await?;
            staged_bytes += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);
        tracing::debug!(staged_bytes, "upload staged");

        self.store.ensure_container().await?;

        let id = self.ids.generate();
        let source = tokio::fs::File::from_std(staged.reopen()?);
        self.store.put_large(&id, content_type, source, &self.rules).await
    }
}

impl std::fmt::Debug for UploadPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadPipeline")
            .field("store", &self.store)
            .field("ids", &self.ids)
            .field("rules", &self.rules)
            .field("staging_dir", &self.staging_dir)
            .finish()
    }
}
