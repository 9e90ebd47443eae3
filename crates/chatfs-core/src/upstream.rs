//! The transport seam.
//!
//! The chunked-transfer client that talks to the messaging service lives
//! outside this crate. It is consumed through [`Upstream`], which exposes
//! only peer resolution, paginated dialog/message queries and a raw chunk
//! fetch. Retries belong to the implementation; the core calls each
//! primitive at most once per attempt.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{Dialog, Entities, FileLocation, Message, Peer};

/// Failures reported by the transport, surfaced to callers unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Session is not authorized")]
    Unauthorized,
}

/// Continuation point for dialog pagination, echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogCursor {
    pub offset_date: DateTime<Utc>,
    pub offset_id: i32,
    pub offset_peer: Option<Peer>,
}

/// One page of the dialog list.
#[derive(Debug, Clone, Default)]
pub struct DialogPage {
    pub dialogs: Vec<Dialog>,
    /// Users, chats and channels referenced by `dialogs`.
    pub entities: Entities,
    /// `None` when this is the last page.
    pub next: Option<DialogCursor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFilter {
    Any,
    /// Only messages carrying a document or photo.
    Document,
}

/// Parameters of a message search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub filter: MessageFilter,
    pub min_date: Option<DateTime<Utc>>,
    pub max_date: Option<DateTime<Utc>>,
    /// Return only messages with an id strictly below this one; 0 means
    /// start from the newest message.
    pub offset_id: i32,
    pub limit: usize,
    /// Return the oldest matches first instead of the newest.
    pub oldest_first: bool,
}

impl SearchQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            filter: MessageFilter::Any,
            min_date: None,
            max_date: None,
            offset_id: 0,
            limit,
            oldest_first: false,
        }
    }

    pub fn filter(mut self, filter: MessageFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn date_range(mut self, min: DateTime<Utc>, max: DateTime<Utc>) -> Self {
        self.min_date = Some(min);
        self.max_date = Some(max);
        self
    }

    pub fn offset_id(mut self, offset_id: i32) -> Self {
        self.offset_id = offset_id;
        self
    }

    pub fn oldest_first(mut self) -> Self {
        self.oldest_first = true;
        self
    }
}

/// Primitives the transport client must provide.
///
/// Implementations are expected to multiplex concurrent calls over one
/// long-lived session.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Resolve a public username through the contacts directory.
    async fn resolve_username(&self, username: &str) -> Result<Peer, UpstreamError>;

    async fn resolve_channel(&self, id: i64) -> Result<Peer, UpstreamError>;

    async fn resolve_user(&self, id: i64) -> Result<Peer, UpstreamError>;

    async fn resolve_chat(&self, id: i64) -> Result<Peer, UpstreamError>;

    /// Fetch one page of dialogs, starting at `cursor` (or the top).
    async fn dialogs(
        &self,
        cursor: Option<&DialogCursor>,
        limit: usize,
    ) -> Result<DialogPage, UpstreamError>;

    /// Fetch one page of messages from `peer` matching `query`.
    async fn search_messages(
        &self,
        peer: &Peer,
        query: &SearchQuery,
    ) -> Result<Vec<Message>, UpstreamError>;

    /// Fetch up to `limit` raw bytes of a file starting at `offset`.
    async fn get_file(
        &self,
        location: &FileLocation,
        offset: u64,
        limit: u32,
    ) -> Result<Bytes, UpstreamError>;
}
