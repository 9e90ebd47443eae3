//! The adapter instance: listings, path resolution and link dispatch over
//! one upstream session.
//!
//! Every collaborator is injected at construction and the cache is owned by
//! the instance, so several drives over different sessions never share
//! state.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::DriveCache;
use crate::config::DriveConfig;
use crate::content::ContentStreamer;
use crate::dialogs::DialogLister;
use crate::error::{DriveError, Result};
use crate::ids::CompositeKey;
use crate::model::VirtualNode;
use crate::peers::PeerResolver;
use crate::periods::PeriodLister;
use crate::sign::{clean_path, join_path, ThumbnailUrls};
use crate::stream::{ByteStream, Link, LinkKind};
use crate::thumbnail::ThumbnailExtractor;
use crate::upstream::Upstream;

pub struct ChatDrive {
    dialogs: DialogLister,
    periods: PeriodLister,
    thumbnails: ThumbnailExtractor,
    content: ContentStreamer,
    sweeper: JoinHandle<()>,
}

impl ChatDrive {
    /// Must be called from within a tokio runtime: the cache sweep is
    /// spawned here and stopped when the drive is dropped.
    pub fn new(upstream: Arc<dyn Upstream>, thumbs: ThumbnailUrls, config: &DriveConfig) -> Self {
        let cache = DriveCache::new(config.listing_ttl);
        let resolver = PeerResolver::new(upstream.clone());
        let sweeper = cache.spawn_sweeper(config.sweep_interval);

        info!(
            batch_size = config.batch_size,
            listing_ttl_secs = config.listing_ttl.as_secs(),
            fixed_window = config.period_window.is_some(),
            "Drive initialised"
        );

        Self {
            dialogs: DialogLister::new(upstream.clone(), cache.clone(), config.batch_size, config.listing_ttl),
            periods: PeriodLister::new(
                upstream.clone(),
                resolver.clone(),
                cache.clone(),
                thumbs,
                config.batch_size,
                config.listing_ttl,
                config.period_window,
            ),
            thumbnails: ThumbnailExtractor::new(upstream.clone(), resolver.clone(), cache, config.thumbnail_ttl),
            content: ContentStreamer::new(upstream, resolver),
            sweeper,
        }
    }

    /// Children of the directory `dir_id`; the empty id is the root.
    /// `req_path` is the directory's virtual path.
    pub async fn list(&self, dir_id: &str, req_path: &str) -> Result<Vec<VirtualNode>> {
        if dir_id.is_empty() {
            return self.dialogs.list_root().await;
        }
        let key = CompositeKey::decode(dir_id)?;
        match key.depth() {
            1 => self.periods.list_periods(&key).await,
            2 => self.periods.list_files(&key, req_path).await,
            _ => Err(DriveError::MalformedKey(format!("{dir_id} is a file, not a directory"))),
        }
    }

    /// Open a link to the node `id`.
    pub async fn link(&self, id: &str, kind: LinkKind, cancel: &CancellationToken) -> Result<Link> {
        let key = CompositeKey::decode(id)?;
        let Some(message_id) = key.message_id else {
            return match kind {
                LinkKind::Content => Err(DriveError::NotImplemented),
                LinkKind::Thumbnail => Err(DriveError::MalformedKey(format!("{id} has no thumbnail"))),
            };
        };
        let peer = key.peer.to_string();
        match kind {
            LinkKind::Thumbnail => self.thumbnails.fetch(&peer, message_id, cancel).await,
            LinkKind::Content => self.content.open(&peer, message_id, cancel).await,
        }
    }

    /// Find the node at the `/`-separated virtual `path` by walking the
    /// listings from the root and matching entry names.
    pub async fn resolve_path(&self, path: &str) -> Result<VirtualNode> {
        let path = clean_path(path);
        let mut node = VirtualNode::root();
        let mut dir_path = String::from("/");

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !node.is_folder {
                return Err(DriveError::ObjectNotFound);
            }
            let children = self.list(&node.id, &dir_path).await?;
            node = children
                .into_iter()
                .find(|child| child.name == segment)
                .ok_or(DriveError::ObjectNotFound)?;
            dir_path = join_path(&dir_path, segment);
        }

        debug!(path = %path, id = %node.id, "Resolved path");
        Ok(node)
    }

    pub fn make_dir(&self, _parent_id: &str, _name: &str) -> Result<VirtualNode> {
        Err(rejected("make_dir"))
    }

    pub fn move_node(&self, _id: &str, _dest_dir_id: &str) -> Result<VirtualNode> {
        Err(rejected("move"))
    }

    pub fn rename(&self, _id: &str, _new_name: &str) -> Result<VirtualNode> {
        Err(rejected("rename"))
    }

    pub fn copy(&self, _id: &str, _dest_dir_id: &str) -> Result<VirtualNode> {
        Err(rejected("copy"))
    }

    pub fn remove(&self, _id: &str) -> Result<()> {
        Err(rejected("remove"))
    }

    pub fn put(&self, _dest_dir_id: &str, _name: &str, _body: ByteStream) -> Result<VirtualNode> {
        Err(rejected("put"))
    }
}

fn rejected(op: &'static str) -> DriveError {
    debug!(op, "Rejected mutating operation on read-only drive");
    DriveError::NotImplemented
}

impl Drop for ChatDrive {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}
