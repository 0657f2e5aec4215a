use futures::TryStreamExt;
use serde::Serialize;

use crate::{BlobResult, ContainerUrl, ObjectId, ObjectStore};

/// A stored object as presented to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentObject {
    pub id: ObjectId,
    pub url: String,
}

/// Produces the complete set of stored objects with their public URLs
#[derive(Debug, Clone)]
pub struct ListingService {
    store: ObjectStore,
    base: ContainerUrl,
}

impl ListingService {
    pub fn new(store: ObjectStore, base: ContainerUrl) -> Self {
        Self { store, base }
    }

    pub fn base_url(&self) -> &ContainerUrl {
        &self.base
    }

    pub fn object_url(&self, id: &ObjectId) -> String {
        self.base.object_url(id)
    }

    /// Drain the whole listing, in store order.
    ///
    /// All or nothing: a failure on any page discards what was collected.
    /// The container is provisioned first so a fresh deployment lists empty.
    #[tracing::instrument(skip(self))]
    pub async fn recent(&self) -> BlobResult<Vec<RecentObject>> {
        // Creates the bucket on first read if it does not exist yet.
        self.store.ensure_container().await?;

        let objects: Vec<RecentObject> = self
            .store
            .list_all()
            .map_ok(|summary| {
                let id = ObjectId::from_key(summary.key);
                RecentObject {
                    url: self.base.object_url(&id),
                    id,
                }
            })
            .try_collect()
            .await?;

        tracing::debug!(count = objects.len(), "listed container");
        Ok(objects)
    }
}
