//! Thumbnail links.
//!
//! A thumbnail is small enough to arrive in a single upstream chunk, so it
//! is fetched once, cached as raw bytes, and replayed from the cache while
//! fresh.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{thumbnail_key, CachedValue, DriveCache};
use crate::error::{DriveError, Result};
use crate::model::ThumbnailRef;
use crate::pager::locate_message;
use crate::peers::PeerResolver;
use crate::stream::{ByteStream, ChunkSender, Link, LinkHeaders};
use crate::upstream::Upstream;

/// Upper bound of the single thumbnail fetch.
pub const THUMBNAIL_FETCH_LIMIT: u32 = 1024 * 1024;

const THUMBNAIL_MIME: &str = "image/jpeg";

fn headers(message_id: i32, len: Option<u64>) -> LinkHeaders {
    LinkHeaders::new(THUMBNAIL_MIME, &format!("{message_id}.jpg"), len)
}

#[derive(Clone)]
pub struct ThumbnailExtractor {
    upstream: Arc<dyn Upstream>,
    resolver: PeerResolver,
    cache: DriveCache,
    ttl: Duration,
}

impl ThumbnailExtractor {
    pub fn new(upstream: Arc<dyn Upstream>, resolver: PeerResolver, cache: DriveCache, ttl: Duration) -> Self {
        Self {
            upstream,
            resolver,
            cache,
            ttl,
        }
    }

    /// Link to the best thumbnail of message `message_id` in `peer_token`.
    ///
    /// Returns as soon as the message is located; the fetch runs in the
    /// background and its bytes arrive through the link body. Cancelling
    /// `cancel` ends the body with [`DriveError::Cancelled`].
    pub async fn fetch(&self, peer_token: &str, message_id: i32, cancel: &CancellationToken) -> Result<Link> {
        if let Some(bytes) = self.cache.thumbnail(peer_token, message_id).await {
            debug!(peer = peer_token, message_id, "Thumbnail served from cache");
            return Ok(Link {
                headers: headers(message_id, Some(bytes.len() as u64)),
                body: ByteStream::from_bytes(bytes),
            });
        }

        let peer = self.resolver.resolve(peer_token).await?;
        let message = locate_message(self.upstream.as_ref(), &peer, message_id)
            .await?
            .ok_or(DriveError::ObjectNotFound)?;
        let thumb = message.media.thumbnail().ok_or(DriveError::ObjectNotFound)?;

        info!(peer = peer.id, message_id, size = thumb.size, "Fetching thumbnail");
        let (tx, body) = ByteStream::channel();
        let fetch = ThumbnailFetch {
            upstream: self.upstream.clone(),
            cache: self.cache.clone(),
            key: thumbnail_key(peer_token, message_id),
            ttl: self.ttl,
        };
        // a rendition without an advertised size is sent unframed
        let expected = (thumb.size > 0).then_some(u64::from(thumb.size));
        let link_headers = headers(message_id, expected);
        tokio::spawn(fetch.run(thumb, tx, cancel.clone()));

        Ok(Link {
            headers: link_headers,
            body,
        })
    }
}

struct ThumbnailFetch {
    upstream: Arc<dyn Upstream>,
    cache: DriveCache,
    key: String,
    ttl: Duration,
}

impl ThumbnailFetch {
    async fn run(self, thumb: ThumbnailRef, tx: ChunkSender, cancel: CancellationToken) {
        let fetched = tokio::select! {
            _ = cancel.cancelled() => Err(DriveError::Cancelled),
            _ = tx.closed() => {
                debug!(key = %self.key, "Thumbnail reader went away before the fetch finished");
                return;
            }
            result = self.upstream.get_file(&thumb.location, 0, THUMBNAIL_FETCH_LIMIT) => {
                result.map_err(DriveError::from)
            }
        };

        match fetched {
            Ok(bytes) if thumb.size > 0 && bytes.len() < thumb.size as usize => {
                let e = DriveError::ShortRead {
                    expected: u64::from(thumb.size),
                    received: bytes.len() as u64,
                };
                warn!(key = %self.key, error = %e, "Thumbnail shorter than advertised");
                let _ = tx.send(Err(e)).await;
            }
            Ok(mut bytes) => {
                if thumb.size > 0 {
                    bytes.truncate(thumb.size as usize);
                }
                self.cache
                    .set(self.key, CachedValue::Thumbnail(bytes.clone()), self.ttl)
                    .await;
                let _ = tx.send(Ok(bytes)).await;
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Thumbnail fetch failed");
                let _ = tx.send(Err(e)).await;
            }
        }
    }
}
