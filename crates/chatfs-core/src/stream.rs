//! Links: response headers plus a pull-based body.
//!
//! Producers feed a bounded channel of capacity one, so at most one chunk
//! is buffered between the upstream fetch and the reader.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio::sync::mpsc;

use crate::error::{DriveError, Result};

/// What kind of link is requested for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Content,
    Thumbnail,
}

impl LinkKind {
    /// Maps the `type` query parameter of a proxy URL.
    pub fn from_query(kind: Option<&str>) -> Self {
        match kind {
            Some("thumb") => LinkKind::Thumbnail,
            _ => LinkKind::Content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkHeaders {
    pub content_type: String,
    /// Full header value, e.g. `filename="report.pdf"`.
    pub content_disposition: String,
    pub content_length: Option<u64>,
}

impl LinkHeaders {
    pub fn new(content_type: impl Into<String>, file_name: &str, content_length: Option<u64>) -> Self {
        Self {
            content_type: content_type.into(),
            content_disposition: format!("filename=\"{}\"", file_name.replace('"', "\\\"")),
            content_length,
        }
    }
}

pub struct Link {
    pub headers: LinkHeaders,
    pub body: ByteStream,
}

/// Sending half held by a producer task.
pub type ChunkSender = mpsc::Sender<Result<Bytes>>;

/// Body of a link. Yields chunks until the producer finishes; a producer
/// failure or cancellation arrives as a final `Err` item.
pub struct ByteStream {
    rx: mpsc::Receiver<Result<Bytes>>,
}

impl ByteStream {
    /// A connected producer/consumer pair with room for one chunk.
    pub fn channel() -> (ChunkSender, ByteStream) {
        let (tx, rx) = mpsc::channel(1);
        (tx, ByteStream { rx })
    }

    /// A stream that yields `bytes` once and ends.
    pub fn from_bytes(bytes: Bytes) -> Self {
        let (tx, stream) = Self::channel();
        // capacity one, freshly created: cannot be full
        let _ = tx.try_send(Ok(bytes));
        stream
    }

    /// Read the whole body, failing on the first error item.
    pub async fn read_to_end(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.rx.recv().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl Stream for ByteStream {
    type Item = std::result::Result<Bytes, DriveError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
