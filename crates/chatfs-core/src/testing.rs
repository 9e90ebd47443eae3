//! Scripted in-memory [`Upstream`] for tests.
//!
//! Every call is recorded so tests can assert on how many upstream queries
//! an operation issued and in which order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};

use crate::model::{
    Channel, Chat, Dialog, Document, Entities, FileLocation, Message, MessageMedia, Peer,
    PeerKind, Photo, PhotoSize, User,
};
use crate::sign::{LinkSigner, ThumbnailUrls};
use crate::upstream::{DialogCursor, DialogPage, MessageFilter, SearchQuery, Upstream, UpstreamError};

/// Midnight UTC on the given day.
pub fn ts(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .expect("valid test date")
}

/// Signs every path as `sig(<path>)`.
pub struct EchoSigner;

impl LinkSigner for EchoSigner {
    fn sign(&self, path: &str) -> String {
        format!("sig({path})")
    }
}

/// Thumbnail URLs rooted at `https://drive.test`, signed by [`EchoSigner`].
pub fn test_urls() -> ThumbnailUrls {
    ThumbnailUrls::new("https://drive.test", std::sync::Arc::new(EchoSigner))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ResolveUsername(String),
    ResolveChannel(i64),
    ResolveUser(i64),
    ResolveChat(i64),
    Dialogs { offset: usize },
    Search { peer: i64, query: SearchQuery },
    GetFile { location: FileLocation, offset: u64, limit: u32 },
}

type FileKey = (i64, Option<String>);

fn file_key(location: &FileLocation) -> FileKey {
    match location {
        FileLocation::Document { id, thumb_size, .. } => (*id, thumb_size.clone()),
        FileLocation::Photo { id, thumb_size, .. } => (*id, Some(thumb_size.clone())),
    }
}

#[derive(Default)]
pub struct FakeUpstream {
    pub channels: HashMap<i64, Peer>,
    pub users: HashMap<i64, Peer>,
    pub chats: HashMap<i64, Peer>,
    pub usernames: HashMap<String, Peer>,
    pub dialogs: Vec<Dialog>,
    pub entities: Entities,
    pub messages: HashMap<i64, Vec<Message>>,
    files: HashMap<FileKey, Bytes>,
    stall_files: AtomicBool,
    search_budget: Mutex<Option<(usize, UpstreamError)>>,
    dialog_error: Mutex<Option<UpstreamError>>,
    visible_dialogs: Mutex<Option<usize>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    /// Let `successes` searches through, then fail every later one.
    pub fn fail_search_after(&self, successes: usize, error: UpstreamError) {
        *self.search_budget.lock().expect("budget lock") = Some((successes, error));
    }

    /// Fail every dialog query with `error`.
    pub fn fail_dialogs(&self, error: UpstreamError) {
        *self.dialog_error.lock().expect("dialog lock") = Some(error);
    }

    /// Expose only the first `count` dialogs until [`show_all_dialogs`]
    /// is called, as if the rest did not exist yet.
    ///
    /// [`show_all_dialogs`]: Self::show_all_dialogs
    pub fn limit_visible_dialogs(&self, count: usize) {
        *self.visible_dialogs.lock().expect("visible lock") = Some(count);
    }

    pub fn show_all_dialogs(&self) {
        *self.visible_dialogs.lock().expect("visible lock") = None;
    }

    /// Make every `get_file` call hang forever.
    pub fn stall_files(&self) {
        self.stall_files.store(true, Ordering::SeqCst);
    }

    pub fn add_user_dialog(&mut self, id: i64, first_name: &str, last_message_at: DateTime<Utc>) {
        let peer = Peer::new(id, PeerKind::User, id * 7);
        self.users.insert(id, peer.clone());
        self.entities.users.insert(
            id,
            User {
                id,
                first_name: first_name.to_string(),
                ..Default::default()
            },
        );
        self.push_dialog(peer, last_message_at);
    }

    pub fn add_channel_dialog(
        &mut self,
        id: i64,
        title: &str,
        megagroup: bool,
        last_message_at: DateTime<Utc>,
    ) {
        let peer = Peer::new(id, PeerKind::Channel, id * 7);
        self.channels.insert(id, peer.clone());
        self.entities.channels.insert(
            id,
            Channel {
                id,
                title: title.to_string(),
                megagroup,
                ..Default::default()
            },
        );
        self.push_dialog(peer, last_message_at);
    }

    pub fn add_chat_dialog(&mut self, id: i64, title: &str, last_message_at: DateTime<Utc>) {
        let peer = Peer::new(id, PeerKind::Chat, 0);
        self.chats.insert(id, peer.clone());
        self.entities.chats.insert(
            id,
            Chat {
                id,
                title: title.to_string(),
            },
        );
        self.push_dialog(peer, last_message_at);
    }

    fn push_dialog(&mut self, peer: Peer, last_message_at: DateTime<Utc>) {
        self.dialogs.push(Dialog {
            peer,
            top_message_id: 1,
            last_message_at,
        });
    }

    fn push_message(&mut self, peer_id: i64, id: i32, date: DateTime<Utc>, media: MessageMedia) {
        self.messages.entry(peer_id).or_default().push(Message {
            id,
            date,
            text: String::new(),
            media,
        });
    }

    pub fn add_text_message(&mut self, peer_id: i64, id: i32, date: DateTime<Utc>) {
        self.push_message(peer_id, id, date, MessageMedia::None);
    }

    /// Adds a document without thumbnails. Returns the document id.
    pub fn add_document_message(
        &mut self,
        peer_id: i64,
        id: i32,
        date: DateTime<Utc>,
        file_name: &str,
        size: u64,
    ) -> i64 {
        let doc_id = i64::from(id) * 100;
        let media = MessageMedia::Document(Document {
            id: doc_id,
            access_hash: 1,
            file_reference: vec![0xfe],
            mime_type: "application/pdf".to_string(),
            size,
            file_name: Some(file_name.to_string()),
            thumbs: Vec::new(),
        });
        self.push_message(peer_id, id, date, media);
        doc_id
    }

    /// Adds a document whose `m` thumbnail holds `thumb` (at least two bytes,
    /// so `m` outranks the one-byte `s` stub).
    pub fn add_document_with_thumb(
        &mut self,
        peer_id: i64,
        id: i32,
        date: DateTime<Utc>,
        file_name: &str,
        thumb: Bytes,
    ) -> i64 {
        let advertised = thumb.len() as u32;
        let stub = PhotoSize::Simple {
            kind: "s".to_string(),
            size: 1,
        };
        self.push_document_with_thumb(peer_id, id, date, file_name, vec![stub], advertised, thumb)
    }

    /// Adds a document with a single `m` thumbnail that advertises
    /// `advertised` bytes but serves `thumb`.
    pub fn add_document_with_sized_thumb(
        &mut self,
        peer_id: i64,
        id: i32,
        date: DateTime<Utc>,
        file_name: &str,
        advertised: u32,
        thumb: Bytes,
    ) -> i64 {
        self.push_document_with_thumb(peer_id, id, date, file_name, Vec::new(), advertised, thumb)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_document_with_thumb(
        &mut self,
        peer_id: i64,
        id: i32,
        date: DateTime<Utc>,
        file_name: &str,
        mut thumbs: Vec<PhotoSize>,
        advertised: u32,
        thumb: Bytes,
    ) -> i64 {
        let doc_id = i64::from(id) * 100;
        thumbs.push(PhotoSize::Simple {
            kind: "m".to_string(),
            size: advertised,
        });
        let media = MessageMedia::Document(Document {
            id: doc_id,
            access_hash: 1,
            file_reference: vec![0xfe],
            mime_type: "video/mp4".to_string(),
            size: 10_000,
            file_name: Some(file_name.to_string()),
            thumbs,
        });
        self.files.insert((doc_id, Some("m".to_string())), thumb);
        self.push_message(peer_id, id, date, media);
        doc_id
    }

    pub fn add_photo_message(&mut self, peer_id: i64, id: i32, date: DateTime<Utc>, full: Bytes) -> i64 {
        let photo_id = i64::from(id) * 100;
        let media = MessageMedia::Photo(Photo {
            id: photo_id,
            access_hash: 2,
            file_reference: vec![0xab],
            sizes: vec![
                PhotoSize::Simple {
                    kind: "m".to_string(),
                    size: 16,
                },
                PhotoSize::Progressive {
                    kind: "y".to_string(),
                    sizes: vec![8, full.len() as u32],
                },
            ],
        });
        self.files.insert((photo_id, Some("y".to_string())), full);
        self.push_message(peer_id, id, date, media);
        photo_id
    }

    /// Content served for the document itself (not a thumbnail).
    pub fn put_document_bytes(&mut self, doc_id: i64, bytes: Bytes) {
        self.files.insert((doc_id, None), bytes);
    }
}

fn invalid(message: &str) -> UpstreamError {
    UpstreamError::Rpc {
        code: 400,
        message: message.to_string(),
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn resolve_username(&self, username: &str) -> Result<Peer, UpstreamError> {
        self.record(Call::ResolveUsername(username.to_string()));
        self.usernames
            .get(username)
            .cloned()
            .ok_or_else(|| invalid("USERNAME_NOT_OCCUPIED"))
    }

    async fn resolve_channel(&self, id: i64) -> Result<Peer, UpstreamError> {
        self.record(Call::ResolveChannel(id));
        self.channels.get(&id).cloned().ok_or_else(|| invalid("CHANNEL_INVALID"))
    }

    async fn resolve_user(&self, id: i64) -> Result<Peer, UpstreamError> {
        self.record(Call::ResolveUser(id));
        self.users.get(&id).cloned().ok_or_else(|| invalid("USER_ID_INVALID"))
    }

    async fn resolve_chat(&self, id: i64) -> Result<Peer, UpstreamError> {
        self.record(Call::ResolveChat(id));
        self.chats.get(&id).cloned().ok_or_else(|| invalid("CHAT_ID_INVALID"))
    }

    async fn dialogs(
        &self,
        cursor: Option<&DialogCursor>,
        limit: usize,
    ) -> Result<DialogPage, UpstreamError> {
        let start = cursor.map(|c| c.offset_id as usize).unwrap_or(0);
        self.record(Call::Dialogs { offset: start });
        if let Some(error) = self.dialog_error.lock().expect("dialog lock").clone() {
            return Err(error);
        }

        let total = self
            .visible_dialogs
            .lock()
            .expect("visible lock")
            .map_or(self.dialogs.len(), |n| n.min(self.dialogs.len()));
        let end = (start + limit).min(total);
        let dialogs = self.dialogs.get(start..end).unwrap_or_default().to_vec();
        let next = match dialogs.last() {
            Some(last) if end < total => Some(DialogCursor {
                offset_date: last.last_message_at,
                offset_id: end as i32,
                offset_peer: Some(last.peer.clone()),
            }),
            _ => None,
        };

        Ok(DialogPage {
            dialogs,
            entities: self.entities.clone(),
            next,
        })
    }

    async fn search_messages(
        &self,
        peer: &Peer,
        query: &SearchQuery,
    ) -> Result<Vec<Message>, UpstreamError> {
        self.record(Call::Search {
            peer: peer.id,
            query: query.clone(),
        });

        if let Some((remaining, error)) = self.search_budget.lock().expect("budget lock").as_mut() {
            if *remaining == 0 {
                return Err(error.clone());
            }
            *remaining -= 1;
        }

        let mut found: Vec<Message> = self
            .messages
            .get(&peer.id)
            .map(|all| {
                all.iter()
                    .filter(|m| match query.filter {
                        MessageFilter::Any => true,
                        MessageFilter::Document => !matches!(m.media, MessageMedia::None),
                    })
                    .filter(|m| query.min_date.map_or(true, |min| m.date >= min))
                    .filter(|m| query.max_date.map_or(true, |max| m.date <= max))
                    .filter(|m| query.offset_id == 0 || m.id < query.offset_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        found.sort_by(|a, b| b.id.cmp(&a.id));
        if query.oldest_first {
            found.reverse();
        }
        found.truncate(query.limit);
        Ok(found)
    }

    async fn get_file(
        &self,
        location: &FileLocation,
        offset: u64,
        limit: u32,
    ) -> Result<Bytes, UpstreamError> {
        self.record(Call::GetFile {
            location: location.clone(),
            offset,
            limit,
        });

        if self.stall_files.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let bytes = self
            .files
            .get(&file_key(location))
            .ok_or_else(|| invalid("FILE_REFERENCE_EXPIRED"))?;
        let start = (offset as usize).min(bytes.len());
        let end = (start + limit as usize).min(bytes.len());
        Ok(bytes.slice(start..end))
    }
}
