//! Per-chat listings: month folders, and the files posted in each month.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::{CachedValue, DriveCache};
use crate::config::PeriodWindow;
use crate::error::{DriveError, Result};
use crate::ids::{CompositeKey, Period};
use crate::model::{Peer, VirtualNode};
use crate::pager::{history_bounds, MessagePager};
use crate::peers::PeerResolver;
use crate::sign::ThumbnailUrls;
use crate::upstream::{MessageFilter, SearchQuery, Upstream};

#[derive(Clone)]
pub struct PeriodLister {
    upstream: Arc<dyn Upstream>,
    resolver: PeerResolver,
    cache: DriveCache,
    thumbs: ThumbnailUrls,
    batch_size: usize,
    ttl: Duration,
    window: Option<PeriodWindow>,
}

impl PeriodLister {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        resolver: PeerResolver,
        cache: DriveCache,
        thumbs: ThumbnailUrls,
        batch_size: usize,
        ttl: Duration,
        window: Option<PeriodWindow>,
    ) -> Self {
        Self {
            upstream,
            resolver,
            cache,
            thumbs,
            batch_size,
            ttl,
            window,
        }
    }

    /// One folder per month, ascending. The months span the chat's
    /// document history unless a fixed window is configured.
    pub async fn list_periods(&self, key: &CompositeKey) -> Result<Vec<VirtualNode>> {
        if key.depth() != 1 {
            return Err(DriveError::MalformedKey(format!(
                "expected a chat key, got {key}"
            )));
        }
        let cache_key = key.encode();
        if let Some(nodes) = self.cache.listing(&cache_key).await {
            debug!(key = %cache_key, "Period listing served from cache");
            return Ok(nodes.as_ref().clone());
        }

        let peer = self.resolver.resolve(&key.peer.to_string()).await?;
        let months = self.months_for(&peer).await?;
        let nodes: Vec<VirtualNode> = months
            .into_iter()
            .map(|period| {
                VirtualNode::folder(
                    CompositeKey::period(key.peer, period).encode(),
                    period.to_string(),
                    period.start(),
                )
            })
            .collect();

        info!(key = %cache_key, count = nodes.len(), "Materialized period listing");
        self.store(cache_key, &nodes).await;
        Ok(nodes)
    }

    async fn months_for(&self, peer: &Peer) -> Result<Vec<Period>> {
        if let Some(window) = self.window {
            return Ok(window.first.through(window.last));
        }
        let bounds = history_bounds(self.upstream.as_ref(), peer, MessageFilter::Document).await?;
        Ok(match bounds {
            Some((oldest, newest)) => Period::containing(oldest).through(Period::containing(newest)),
            None => {
                debug!(peer = peer.id, "No documents, empty period listing");
                Vec::new()
            }
        })
    }

    /// Files attached to messages sent within the key's month. `req_path`
    /// is the virtual directory being listed, used to build thumbnail URLs.
    pub async fn list_files(&self, key: &CompositeKey, req_path: &str) -> Result<Vec<VirtualNode>> {
        let (Some(period), None) = (key.period, key.message_id) else {
            return Err(DriveError::MalformedKey(format!(
                "expected a period key, got {key}"
            )));
        };
        let cache_key = key.encode();
        if let Some(nodes) = self.cache.listing(&cache_key).await {
            debug!(key = %cache_key, "File listing served from cache");
            return Ok(nodes.as_ref().clone());
        }

        let peer = self.resolver.resolve(&key.peer.to_string()).await?;
        let (start, end) = period.bounds();
        let query = SearchQuery::new(self.batch_size)
            .filter(MessageFilter::Document)
            .date_range(start, end);
        let messages = MessagePager::new(self.upstream.as_ref(), &peer, query)
            .collect()
            .await?;

        let mut nodes = Vec::new();
        for message in messages {
            // the upstream range is inclusive at both ends
            if message.date < start || message.date >= end {
                continue;
            }
            let Some(file) = message.media.file() else {
                continue;
            };
            let thumbnail_url = message
                .media
                .thumbnail()
                .map(|_| self.thumbs.url_for(req_path, &file.name));
            nodes.push(VirtualNode::file(
                CompositeKey::message(key.peer, period, message.id).encode(),
                file.name,
                message.date,
                file.size,
                thumbnail_url,
            ));
        }

        info!(key = %cache_key, count = nodes.len(), "Materialized file listing");
        self.store(cache_key, &nodes).await;
        Ok(nodes)
    }

    async fn store(&self, key: String, nodes: &[VirtualNode]) {
        self.cache
            .set(key, CachedValue::Listing(Arc::new(nodes.to_vec())), self.ttl)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Duration as ChronoDuration;

    use crate::cache::DEFAULT_TTL;
    use crate::testing::{test_urls, ts, Call, FakeUpstream};

    const NEWS: i64 = 1001;

    fn lister(fake: Arc<FakeUpstream>, window: Option<PeriodWindow>) -> PeriodLister {
        PeriodLister::new(
            fake.clone(),
            PeerResolver::new(fake),
            DriveCache::new(DEFAULT_TTL),
            test_urls(),
            100,
            DEFAULT_TTL,
            window,
        )
    }

    fn news() -> FakeUpstream {
        let mut fake = FakeUpstream::new();
        fake.add_channel_dialog(NEWS, "News", false, ts(2023, 3, 1));
        fake
    }

    fn nov() -> CompositeKey {
        CompositeKey::period(NEWS, Period::new(2022, 11).unwrap())
    }

    #[tokio::test]
    async fn test_single_document_in_period() {
        let mut fake = news();
        fake.add_document_message(NEWS, 42, ts(2022, 11, 15), "report.pdf", 2048);
        fake.add_text_message(NEWS, 43, ts(2022, 11, 16));
        fake.add_document_message(NEWS, 50, ts(2022, 12, 2), "later.pdf", 1);

        let nodes = lister(Arc::new(fake), None)
            .list_files(&nov(), "/News ChatChannel/2022-11")
            .await
            .unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, "1001:2022-11:42");
        assert_eq!(nodes[0].name, "report.pdf");
        assert_eq!(nodes[0].size, 2048);
        assert!(!nodes[0].is_folder);
        assert!(nodes[0].thumbnail_url.is_none());
    }

    #[tokio::test]
    async fn test_empty_period_is_empty_folder() {
        let mut fake = news();
        fake.add_text_message(NEWS, 1, ts(2022, 11, 3));
        let nodes = lister(Arc::new(fake), None)
            .list_files(&nov(), "/News ChatChannel/2022-11")
            .await
            .unwrap();
        assert!(nodes.is_empty());
    }

    #[tokio::test]
    async fn test_next_month_start_is_excluded() {
        let mut fake = news();
        fake.add_document_message(NEWS, 1, ts(2022, 11, 1), "first.pdf", 1);
        fake.add_document_message(NEWS, 2, ts(2022, 12, 1), "december.pdf", 1);
        fake.add_document_message(
            NEWS,
            3,
            ts(2022, 12, 1) - ChronoDuration::seconds(1),
            "last.pdf",
            1,
        );

        let nodes = lister(Arc::new(fake), None)
            .list_files(&nov(), "/n")
            .await
            .unwrap();
        let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["last.pdf", "first.pdf"]);
    }

    #[tokio::test]
    async fn test_thumbnail_url_only_for_media_with_thumbnail() {
        let mut fake = news();
        fake.add_document_with_thumb(NEWS, 7, ts(2022, 11, 20), "clip.mp4", Bytes::from_static(b"jpeg"));
        fake.add_document_message(NEWS, 6, ts(2022, 11, 19), "plain.pdf", 10);

        let nodes = lister(Arc::new(fake), None)
            .list_files(&nov(), "/News ChatChannel/2022-11")
            .await
            .unwrap();
        let url = nodes[0].thumbnail_url.as_deref().unwrap();
        assert!(url.starts_with("https://drive.test/p/News%20ChatChannel/2022-11/clip.mp4?type=thumb&sign="));
        assert!(nodes[1].thumbnail_url.is_none());
    }

    #[tokio::test]
    async fn test_photo_size_is_largest_rendition() {
        let mut fake = news();
        let photo_id = fake.add_photo_message(NEWS, 9, ts(2022, 11, 2), Bytes::from(vec![0u8; 300]));
        let nodes = lister(Arc::new(fake), None)
            .list_files(&nov(), "/n")
            .await
            .unwrap();
        assert_eq!(nodes[0].name, format!("photo_{photo_id}.jpg"));
        assert_eq!(nodes[0].size, 300);
        assert!(nodes[0].thumbnail_url.is_some());
    }

    #[tokio::test]
    async fn test_periods_follow_document_history() {
        let mut fake = news();
        fake.add_document_message(NEWS, 3, ts(2022, 10, 5), "a.pdf", 1);
        fake.add_text_message(NEWS, 4, ts(2022, 8, 1));
        fake.add_document_message(NEWS, 8, ts(2023, 1, 30), "b.pdf", 1);

        let nodes = lister(Arc::new(fake), None)
            .list_periods(&CompositeKey::peer(NEWS))
            .await
            .unwrap();
        let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["2022-10", "2022-11", "2022-12", "2023-01"]);
        assert_eq!(nodes[1].id, "1001:2022-11");
        assert_eq!(nodes[1].modified_at, ts(2022, 11, 1));
        assert!(nodes.iter().all(|n| n.is_folder));
    }

    #[tokio::test]
    async fn test_no_documents_no_periods() {
        let mut fake = news();
        fake.add_text_message(NEWS, 1, ts(2022, 11, 3));
        let nodes = lister(Arc::new(fake), None)
            .list_periods(&CompositeKey::peer(NEWS))
            .await
            .unwrap();
        assert!(nodes.is_empty());
    }

    #[tokio::test]
    async fn test_configured_window_skips_history_search() {
        let fake = Arc::new(news());
        let window = PeriodWindow::parse("2022-10..2023-01").unwrap();

        let nodes = lister(fake.clone(), Some(window))
            .list_periods(&CompositeKey::peer(NEWS))
            .await
            .unwrap();
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0].id, "1001:2022-10");
        assert_eq!(fake.count(|c| matches!(c, Call::Search { .. })), 0);
    }

    #[tokio::test]
    async fn test_listings_are_cached_per_key() {
        let mut fake = news();
        fake.add_document_message(NEWS, 42, ts(2022, 11, 15), "report.pdf", 2048);
        let fake = Arc::new(fake);
        let lister = lister(fake.clone(), None);

        let first = lister.list_files(&nov(), "/n").await.unwrap();
        let second = lister.list_files(&nov(), "/n").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fake.count(|c| matches!(c, Call::Search { .. })), 1);
    }

    #[tokio::test]
    async fn test_wrong_depth_is_malformed() {
        let lister = lister(Arc::new(news()), None);
        assert!(matches!(
            lister.list_files(&CompositeKey::peer(NEWS), "/").await,
            Err(DriveError::MalformedKey(_))
        ));
        assert!(matches!(
            lister.list_periods(&nov()).await,
            Err(DriveError::MalformedKey(_))
        ));
    }
}
