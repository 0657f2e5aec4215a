use serde::{Deserialize, Serialize};

use crate::ObjectId;

/// Receipt returned after an object is durably stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutReceipt {
    pub id: ObjectId,
    pub key: String,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub created_at: i64,
    pub upload: UploadMethod,
}

/// How the object reached the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum UploadMethod {
    /// One request
    Single,
    /// Staged blocks published by a commit
    Blocks { block_size: u64, blocks: u32 },
}

impl PutReceipt {
    pub fn new(id: ObjectId, size_bytes: u64, upload: UploadMethod) -> Self {
        Self {
            key: id.as_str().to_string(),
            id,
            size_bytes,
            content_type: None,
            etag: None,
            created_at: chrono::Utc::now().timestamp(),
            upload,
        }
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: Option<S>) -> Self {
        self.content_type = content_type.map(Into::into);
        self
    }

    pub fn with_etag(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }

    /// Number of requests that carried object bytes
    pub fn block_count(&self) -> u32 {
        match self.upload {
            UploadMethod::Single => 1,
            UploadMethod::Blocks { blocks, .. } => blocks,
        }
    }
}
