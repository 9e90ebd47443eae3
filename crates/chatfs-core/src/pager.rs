//! Pagination over the upstream dialog and message queries.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::Result;
use crate::model::{Message, Peer};
use crate::upstream::{DialogCursor, DialogPage, MessageFilter, SearchQuery, Upstream};

/// Default page size for dialog and message queries.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Walks the dialog list page by page.
pub struct DialogPager<'a> {
    upstream: &'a dyn Upstream,
    batch_size: usize,
    cursor: Option<DialogCursor>,
    done: bool,
}

impl<'a> DialogPager<'a> {
    pub fn new(upstream: &'a dyn Upstream, batch_size: usize) -> Self {
        Self {
            upstream,
            batch_size,
            cursor: None,
            done: false,
        }
    }

    /// Next page, or `None` once the list is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<DialogPage>> {
        if self.done {
            return Ok(None);
        }

        let mut page = self
            .upstream
            .dialogs(self.cursor.as_ref(), self.batch_size)
            .await?;
        debug!(
            count = page.dialogs.len(),
            has_more = page.next.is_some(),
            "Fetched dialog page"
        );

        if page.dialogs.is_empty() {
            self.done = true;
            return Ok(None);
        }
        if page.dialogs.len() < self.batch_size {
            self.done = true;
        }
        match page.next.take() {
            Some(cursor) => self.cursor = Some(cursor),
            None => self.done = true,
        }
        Ok(Some(page))
    }
}

/// Iterates the results of a message search, newest first, refilling from
/// upstream one page at a time.
pub struct MessagePager<'a> {
    upstream: &'a dyn Upstream,
    peer: &'a Peer,
    query: SearchQuery,
    buffer: VecDeque<Message>,
    done: bool,
}

impl<'a> MessagePager<'a> {
    pub fn new(upstream: &'a dyn Upstream, peer: &'a Peer, query: SearchQuery) -> Self {
        Self {
            upstream,
            peer,
            query,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    pub async fn next(&mut self) -> Result<Option<Message>> {
        if self.buffer.is_empty() && !self.done {
            self.fill().await?;
        }
        Ok(self.buffer.pop_front())
    }

    async fn fill(&mut self) -> Result<()> {
        let page = self.upstream.search_messages(self.peer, &self.query).await?;
        debug!(
            peer = self.peer.id,
            offset_id = self.query.offset_id,
            count = page.len(),
            "Fetched message page"
        );

        if page.len() < self.query.limit {
            self.done = true;
        }
        match page.last() {
            // continue below the oldest id seen so far
            Some(last) => self.query.offset_id = last.id,
            None => self.done = true,
        }
        self.buffer.extend(page);
        Ok(())
    }

    /// Drain the whole result set. An error discards everything gathered.
    pub async fn collect(mut self) -> Result<Vec<Message>> {
        let mut all = Vec::new();
        while let Some(message) = self.next().await? {
            all.push(message);
        }
        Ok(all)
    }
}

/// Find message `id` in `peer`'s history.
///
/// The query surface only offers windowed search, so this asks for the
/// single newest message below `id + 1`. A result with a different id means
/// `id` does not exist (deleted, or never sent).
pub async fn locate_message(upstream: &dyn Upstream, peer: &Peer, id: i32) -> Result<Option<Message>> {
    let query = SearchQuery::new(1).offset_id(id.saturating_add(1));
    let found = upstream
        .search_messages(peer, &query)
        .await?
        .into_iter()
        .next()
        .filter(|message| message.id == id);
    Ok(found)
}

/// Dates of the oldest and newest messages matching `filter`, or `None`
/// when the peer has none.
pub async fn history_bounds(
    upstream: &dyn Upstream,
    peer: &Peer,
    filter: MessageFilter,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
    let newest = upstream
        .search_messages(peer, &SearchQuery::new(1).filter(filter))
        .await?;
    let Some(newest) = newest.into_iter().next() else {
        return Ok(None);
    };

    let oldest = upstream
        .search_messages(peer, &SearchQuery::new(1).filter(filter).oldest_first())
        .await?;
    let oldest_date = oldest
        .into_iter()
        .next()
        .map(|m| m.date)
        .unwrap_or(newest.date);

    Ok(Some((oldest_date, newest.date)))
}
