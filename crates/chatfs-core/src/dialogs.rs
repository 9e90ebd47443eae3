//! Root listing: one folder per dialog.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::{CachedValue, DriveCache, ROOT_KEY};
use crate::error::Result;
use crate::ids::CompositeKey;
use crate::model::VirtualNode;
use crate::pager::DialogPager;
use crate::upstream::Upstream;

#[derive(Clone)]
pub struct DialogLister {
    upstream: Arc<dyn Upstream>,
    cache: DriveCache,
    batch_size: usize,
    ttl: Duration,
}

impl DialogLister {
    pub fn new(upstream: Arc<dyn Upstream>, cache: DriveCache, batch_size: usize, ttl: Duration) -> Self {
        Self {
            upstream,
            cache,
            batch_size,
            ttl,
        }
    }

    /// Folders named `"<name> <category>"`, keyed by peer id, in dialog
    /// order. Served from cache while the snapshot is fresh.
    pub async fn list_root(&self) -> Result<Vec<VirtualNode>> {
        if let Some(nodes) = self.cache.listing(ROOT_KEY).await {
            debug!(count = nodes.len(), "Root listing served from cache");
            return Ok(nodes.as_ref().clone());
        }

        let mut nodes = Vec::new();
        let mut pager = DialogPager::new(self.upstream.as_ref(), self.batch_size);
        while let Some(page) = pager.next_page().await? {
            for dialog in &page.dialogs {
                let name = page.entities.display_name(&dialog.peer);
                let category = page.entities.category(&dialog.peer);
                nodes.push(VirtualNode::folder(
                    CompositeKey::peer(dialog.peer.id).encode(),
                    format!("{name} {category}"),
                    dialog.last_message_at,
                ));
            }
        }

        info!(count = nodes.len(), "Materialized root listing");
        self.cache
            .set(ROOT_KEY, CachedValue::Listing(Arc::new(nodes.clone())), self.ttl)
            .await;
        Ok(nodes)
    }
}
