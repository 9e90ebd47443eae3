//! Content links: the file attached to a message, downloaded in chunks and
//! relayed to the reader as it arrives.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{DriveError, Result};
use crate::model::FileLocation;
use crate::pager::locate_message;
use crate::peers::PeerResolver;
use crate::stream::{ByteStream, ChunkSender, Link, LinkHeaders};
use crate::upstream::Upstream;

/// Size of each upstream chunk request.
pub const CHUNK_SIZE: u32 = 1024 * 1024;

#[derive(Clone)]
pub struct ContentStreamer {
    upstream: Arc<dyn Upstream>,
    resolver: PeerResolver,
}

impl ContentStreamer {
    pub fn new(upstream: Arc<dyn Upstream>, resolver: PeerResolver) -> Self {
        Self { upstream, resolver }
    }

    /// Open the file attached to message `message_id` in `peer_token`.
    ///
    /// The download starts in the background; at most one chunk is held
    /// between the download and the reader of the returned body.
    pub async fn open(&self, peer_token: &str, message_id: i32, cancel: &CancellationToken) -> Result<Link> {
        let peer = self.resolver.resolve(peer_token).await?;
        let message = locate_message(self.upstream.as_ref(), &peer, message_id)
            .await?
            .ok_or(DriveError::ObjectNotFound)?;
        let file = message.media.file().ok_or(DriveError::ObjectNotFound)?;

        info!(peer = peer.id, message_id, name = %file.name, size = file.size, "Starting content transfer");
        let headers = LinkHeaders::new(file.mime_type, &file.name, Some(file.size));
        let (tx, body) = ByteStream::channel();
        tokio::spawn(relay(
            self.upstream.clone(),
            file.location,
            file.size,
            tx,
            cancel.clone(),
        ));

        Ok(Link { headers, body })
    }
}

async fn relay(
    upstream: Arc<dyn Upstream>,
    location: FileLocation,
    size: u64,
    tx: ChunkSender,
    cancel: CancellationToken,
) {
    let mut offset: u64 = 0;
    loop {
        let fetched = tokio::select! {
            _ = cancel.cancelled() => Err(DriveError::Cancelled),
            _ = tx.closed() => {
                debug!(offset, "Content reader went away");
                return;
            }
            result = upstream.get_file(&location, offset, CHUNK_SIZE) => result.map_err(DriveError::from),
        };

        let chunk = match fetched {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(offset, error = %e, "Content transfer aborted");
                let _ = tx.send(Err(e)).await;
                return;
            }
        };

        let len = chunk.len() as u64;
        if len > 0 {
            let sent = tokio::select! {
                _ = cancel.cancelled() => Err(DriveError::Cancelled),
                sent = tx.send(Ok(chunk)) => sent.map_err(|_| DriveError::Cancelled),
            };
            if let Err(e) = sent {
                debug!(offset, "Content transfer stopped while sending");
                // reader may still be draining the buffered chunk
                let _ = tx.send(Err(e)).await;
                return;
            }
        }

        offset += len;
        if len < u64::from(CHUNK_SIZE) || offset >= size {
            break;
        }
    }
    debug!(offset, "Content transfer complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::testing::{ts, Call, FakeUpstream};
    use crate::upstream::UpstreamError;

    const NEWS: i64 = 1001;

    fn streamer(fake: Arc<FakeUpstream>) -> ContentStreamer {
        ContentStreamer::new(fake.clone(), PeerResolver::new(fake))
    }

    fn news() -> FakeUpstream {
        let mut fake = FakeUpstream::new();
        fake.add_channel_dialog(NEWS, "News", false, ts(2023, 3, 1));
        fake
    }

    fn fetch_offsets(fake: &FakeUpstream) -> Vec<u64> {
        fake.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::GetFile { offset, .. } => Some(offset),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_streams_file_in_chunks() {
        let data: Vec<u8> = (0..(CHUNK_SIZE as usize * 5 / 2)).map(|i| (i % 251) as u8).collect();
        let mut fake = news();
        let doc_id = fake.add_document_message(NEWS, 42, ts(2022, 11, 15), "big.bin", data.len() as u64);
        fake.put_document_bytes(doc_id, Bytes::from(data.clone()));
        let fake = Arc::new(fake);

        let link = streamer(fake.clone())
            .open("1001", 42, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(link.headers.content_type, "application/pdf");
        assert_eq!(link.headers.content_disposition, "filename=\"big.bin\"");
        assert_eq!(link.headers.content_length, Some(data.len() as u64));

        let body = link.body.read_to_end().await.unwrap();
        assert_eq!(body.as_ref(), data.as_slice());
        let chunk = u64::from(CHUNK_SIZE);
        assert_eq!(fetch_offsets(&fake), vec![0, chunk, 2 * chunk]);
    }

    #[tokio::test]
    async fn test_exact_multiple_stops_at_size() {
        let data = vec![1u8; CHUNK_SIZE as usize];
        let mut fake = news();
        let doc_id = fake.add_document_message(NEWS, 1, ts(2022, 11, 15), "one.bin", data.len() as u64);
        fake.put_document_bytes(doc_id, Bytes::from(data));
        let fake = Arc::new(fake);

        let link = streamer(fake.clone())
            .open("1001", 1, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(link.body.read_to_end().await.unwrap().len(), CHUNK_SIZE as usize);
        assert_eq!(fetch_offsets(&fake), vec![0]);
    }

    #[tokio::test]
    async fn test_missing_message_opens_no_stream() {
        let mut fake = news();
        fake.add_document_message(NEWS, 10, ts(2022, 11, 15), "a.pdf", 1);
        let fake = Arc::new(fake);

        let result = streamer(fake.clone())
            .open("1001", 11, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(DriveError::ObjectNotFound)));
        assert!(fetch_offsets(&fake).is_empty());
    }

    #[tokio::test]
    async fn test_text_message_has_no_content() {
        let mut fake = news();
        fake.add_text_message(NEWS, 3, ts(2022, 11, 15));
        let result = streamer(Arc::new(fake))
            .open("1001", 3, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(DriveError::ObjectNotFound)));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_stalled_download() {
        let mut fake = news();
        fake.add_document_message(NEWS, 42, ts(2022, 11, 15), "big.bin", 10);
        fake.stall_files();
        let cancel = CancellationToken::new();

        let link = streamer(Arc::new(fake)).open("1001", 42, &cancel).await.unwrap();
        cancel.cancel();
        assert!(matches!(link.body.read_to_end().await, Err(DriveError::Cancelled)));
    }

    #[tokio::test]
    async fn test_upstream_error_reaches_reader() {
        let mut fake = news();
        // no bytes registered: the fake reports an expired file reference
        fake.add_document_message(NEWS, 42, ts(2022, 11, 15), "gone.bin", 10);

        let link = streamer(Arc::new(fake))
            .open("1001", 42, &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(
            link.body.read_to_end().await,
            Err(DriveError::Upstream(UpstreamError::Rpc { code: 400, .. }))
        ));
    }

    #[tokio::test]
    async fn test_unknown_peer() {
        let result = streamer(Arc::new(news()))
            .open("31337", 1, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(DriveError::PeerNotFound { id: 31337, .. })));
    }
}
