use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream as AwsByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration,
};
use aws_sdk_s3::Client;
use bytes::Bytes;

use crate::{
    BlobError, BlobResult, BlobStore, BlockReceipt, BlockUpload, ListPage, Marker, PutResult, StoreCapabilities,
    StoredObjectSummary,
};

/// Connection settings for an S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
}

/// [`BlobStore`] backed by one S3 bucket.
///
/// Blocks are multipart-upload parts numbered from 1.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    region: String,
}

impl S3Store {
    /// S3 rejects non-final parts smaller than this
    pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;
    pub const MAX_PARTS: u32 = 10_000;

    pub async fn connect(config: S3Config) -> Self {
        let bucket = config.bucket.clone();
        let region = config.region.clone();
        let client = Self::create_client(config).await;
        tracing::debug!(bucket = %bucket, region = %region, "s3 client ready");
        Self { client, bucket, region }
    }

    /// Wrap an already configured client
    pub fn from_client(client: Client, bucket: String, region: String) -> Self {
        Self { client, bucket, region }
    }

    async fn create_client(config: S3Config) -> Client {
        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "imgup",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint)
            .load()
            .await;

        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(true)
                .build(),
        )
    }

    fn map_aws_error(err: impl std::error::Error + Send + Sync + 'static) -> BlobError {
        BlobError::backend(err)
    }

    fn part_number(index: u32) -> i32 {
        (index + 1) as i32
    }
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BlobStore for S3Store {
    fn container(&self) -> &str {
        &self.bucket
    }

    async fn create_container(&self) -> BlobResult<()> {
        // New buckets are private; no ACL is attached.
        let mut request = self.client.create_bucket().bucket(&self.bucket);
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err) => match err.as_service_error() {
                Some(CreateBucketError::BucketAlreadyOwnedByYou(_)) => {
                    Err(BlobError::already_exists(self.bucket.clone()))
                }
                _ => Err(Self::map_aws_error(err)),
            },
        }
    }

    async fn put(&self, key: &str, content_type: Option<&str>, body: Bytes) -> BlobResult<PutResult> {
        let size_bytes = body.len() as u64;
        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .body(AwsByteStream::from(body))
            .send()
            .await
            .map_err(Self::map_aws_error)?;

        Ok(PutResult {
            etag: result.e_tag,
            size_bytes,
        })
    }

    async fn begin_blocks(&self, key: &str, content_type: Option<&str>) -> BlobResult<BlockUpload> {
        let result = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(Self::map_aws_error)?;

        let upload_id = result
            .upload_id()
            .ok_or_else(|| BlobError::backend_message("create_multipart_upload returned no upload id"))?;

        Ok(BlockUpload {
            key: key.to_string(),
            upload_id: upload_id.to_string(),
        })
    }

    async fn put_block(&self, upload: &BlockUpload, index: u32, body: Bytes) -> BlobResult<BlockReceipt> {
        let size_bytes = body.len() as u64;
        let result = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .part_number(Self::part_number(index))
            .body(AwsByteStream::from(body))
            .send()
            .await
            .map_err(Self::map_aws_error)?;

        let tag = result
            .e_tag()
            .ok_or_else(|| BlobError::backend_message(format!("part {} returned no etag", index + 1)))?;

        Ok(BlockReceipt {
            index,
            tag: tag.to_string(),
            size_bytes,
        })
    }

    async fn commit_blocks(&self, upload: &BlockUpload, blocks: Vec<BlockReceipt>) -> BlobResult<PutResult> {
        let size_bytes = blocks.iter().map(|b| b.size_bytes).sum();
        let parts = blocks
            .into_iter()
            .map(|b| {
                CompletedPart::builder()
                    .part_number(Self::part_number(b.index))
                    .e_tag(b.tag)
                    .build()
            })
            .collect::<Vec<_>>();

        let result = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(parts)).build())
            .send()
            .await
            .map_err(Self::map_aws_error)?;

        Ok(PutResult {
            etag: result.e_tag,
            size_bytes,
        })
    }

    async fn abort_blocks(&self, upload: &BlockUpload) -> BlobResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        Ok(())
    }

    async fn list_page(&self, marker: &Marker) -> BlobResult<ListPage> {
        if marker.is_done() {
            return Ok(ListPage {
                objects: Vec::new(),
                next: Marker::Done,
            });
        }

        let result = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_continuation_token(marker.token().map(str::to_string))
            .send()
            .await
            .map_err(Self::map_aws_error)?;

        let objects = result
            .contents()
            .iter()
            .filter_map(|object| {
                object.key().map(|key| StoredObjectSummary {
                    key: key.to_string(),
                    size_bytes: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: object.last_modified().map(|dt| dt.secs()),
                })
            })
            .collect();

        let next = if result.is_truncated().unwrap_or(false) {
            Marker::from_token(result.next_continuation_token().map(str::to_string))
        } else {
            Marker::Done
        };

        Ok(ListPage { objects, next })
    }

    async fn get(&self, key: &str) -> BlobResult<Bytes> {
        let result = match self.client.get_object().bucket(&self.bucket).key(key).send().await {
            Ok(result) => result,
            Err(err) => {
                return match err.as_service_error() {
                    Some(GetObjectError::NoSuchKey(_)) => Err(BlobError::not_found(key)),
                    _ => Err(Self::map_aws_error(err)),
                }
            }
        };

        let body = result.body.collect().await.map_err(Self::map_aws_error)?;
        Ok(body.into_bytes())
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::basic().with_block_limits(Some(Self::MIN_PART_SIZE), Some(Self::MAX_PARTS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_numbers_start_at_one() {
        assert_eq!(S3Store::part_number(0), 1);
        assert_eq!(S3Store::part_number(9_999), 10_000);
    }

    #[tokio::test]
    async fn advertises_s3_part_limits() {
        let store = S3Store::connect(S3Config {
            endpoint: "http://127.0.0.1:9000".into(),
            region: "us-east-1".into(),
            access_key_id: "test".into(),
            secret_access_key: "test".into(),
            bucket: "imgup".into(),
        })
        .await;

        assert_eq!(store.container(), "imgup");
        let caps = store.capabilities();
        assert_eq!(caps.min_block_size, Some(5 * 1024 * 1024));
        assert_eq!(caps.max_blocks, Some(10_000));
    }
}
