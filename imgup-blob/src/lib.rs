//! # imgup-blob: object storage pipeline for imgup
//!
//! `imgup-blob` owns everything between an inbound upload body and a committed
//! object in a remote container:
//!
//! - **Identifiers**: short, URL-safe, unpredictable object keys
//! - **Idempotent provisioning**: "already exists" is success, anything else fails the request
//! - **Chunked parallel uploads**: fixed-size blocks, bounded concurrency, one ordered commit
//! - **Complete listings**: a lazy walk over every page of the container listing
//! - **Storage agnostic**: S3-compatible buckets or an in-memory store for tests
//!
//! ## Quick Start
//!
//! ```rust
//! use imgup_blob::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let store = ObjectStore::new(MemoryStore::new("imgup"));
//! let pipeline = UploadPipeline::new(store.clone(), &BlobConfig::default());
//!
//! let body = futures::stream::iter(vec![Ok::<_, std::io::Error>(bytes::Bytes::from_static(b"GIF89a"))]);
//! let receipt = pipeline.handle(Some("image/gif"), body).await?;
//!
//! let listing = ListingService::new(store, ContainerUrl::parse("https://cdn.example.com/imgup")?);
//! let recent = listing.recent().await?;
//! assert_eq!(recent[0].id, receipt.id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │ UploadPipeline / ListingService  │  ← request-level flows
//! ├──────────────────────────────────┤
//! │ ObjectStore                      │  ← provisioning, blocks, pagination
//! ├──────────────────────────────────┤
//! │ BlobStore (S3Store, MemoryStore) │  ← storage primitives
//! └──────────────────────────────────┘
//! ```

mod config;
mod error;
mod listing;
mod memory_store;
mod object_store;
mod receipt;
mod s3_store;
pub mod store;
mod types;
mod upload;

// Re-export main types for clean API
pub use config::{BlobConfig, UploadRules};
pub use error::{BlobError, BlobResult};
pub use listing::{ListingService, RecentObject};
pub use memory_store::{Fault, MemoryStore, TransferStats};
pub use object_store::ObjectStore;
pub use receipt::{PutReceipt, UploadMethod};
pub use s3_store::{S3Config, S3Store};
pub use store::{
    BlobStore, BlockReceipt, BlockUpload, ListPage, Marker, PutResult, StoreCapabilities, StoredObjectSummary,
};
pub use types::{ContainerUrl, IdGenerator, IdPolicy, ObjectId};
pub use upload::UploadPipeline;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobConfig, BlobError, BlobResult, BlobStore, ContainerUrl, ListingService, MemoryStore, ObjectId,
        ObjectStore, PutReceipt, UploadPipeline,
    };
}
