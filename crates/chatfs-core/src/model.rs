//! Domain types shared between the upstream seam and the listing layer.
//!
//! Media and thumbnail variants are closed enums; every consumer matches on
//! them exhaustively.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Peers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerKind {
    User,
    Chat,
    Channel,
}

/// A resolved chat, user or channel handle.
///
/// Lives for one request; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: i64,
    pub kind: PeerKind,
    /// Opaque access token the transport needs to address the peer.
    pub access_hash: i64,
}

impl Peer {
    pub fn new(id: i64, kind: PeerKind, access_hash: i64) -> Self {
        Self {
            id,
            kind,
            access_hash,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chat {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channel {
    pub id: i64,
    pub title: String,
    pub username: Option<String>,
    pub megagroup: bool,
    pub gigagroup: bool,
}

/// Entities attached to a page of dialogs, keyed by peer id.
#[derive(Debug, Clone, Default)]
pub struct Entities {
    pub users: HashMap<i64, User>,
    pub chats: HashMap<i64, Chat>,
    pub channels: HashMap<i64, Channel>,
}

/// Category label appended to root folder names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerCategory {
    Private,
    Group,
    Channel,
    Unknown,
}

impl fmt::Display for PeerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PeerCategory::Private => "ChatPrivate",
            PeerCategory::Group => "ChatGroup",
            PeerCategory::Channel => "ChatChannel",
            PeerCategory::Unknown => "ChatUnknown",
        };
        f.write_str(label)
    }
}

impl Entities {
    /// Display name: first + last name for users, title for groups and
    /// channels, the username when neither is set.
    pub fn display_name(&self, peer: &Peer) -> String {
        match peer.kind {
            PeerKind::User => self
                .users
                .get(&peer.id)
                .map(|u| {
                    let full = [u.first_name.trim(), u.last_name.trim()]
                        .iter()
                        .filter(|part| !part.is_empty())
                        .copied()
                        .collect::<Vec<_>>()
                        .join(" ");
                    if full.is_empty() {
                        u.username.clone().unwrap_or_default()
                    } else {
                        full
                    }
                })
                .unwrap_or_default(),
            PeerKind::Channel => self
                .channels
                .get(&peer.id)
                .map(|c| {
                    if c.title.is_empty() {
                        c.username.clone().unwrap_or_default()
                    } else {
                        c.title.clone()
                    }
                })
                .unwrap_or_default(),
            PeerKind::Chat => self
                .chats
                .get(&peer.id)
                .map(|c| c.title.clone())
                .unwrap_or_default(),
        }
    }

    pub fn category(&self, peer: &Peer) -> PeerCategory {
        match peer.kind {
            PeerKind::User if self.users.contains_key(&peer.id) => PeerCategory::Private,
            PeerKind::Channel => match self.channels.get(&peer.id) {
                Some(c) if c.megagroup || c.gigagroup => PeerCategory::Group,
                Some(_) => PeerCategory::Channel,
                None => PeerCategory::Unknown,
            },
            PeerKind::Chat if self.chats.contains_key(&peer.id) => PeerCategory::Group,
            _ => PeerCategory::Unknown,
        }
    }
}

/// A top-level conversation thread.
#[derive(Debug, Clone)]
pub struct Dialog {
    pub peer: Peer,
    /// Id of the most recent message in the dialog.
    pub top_message_id: i32,
    /// Timestamp of the most recent message in the dialog.
    pub last_message_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Messages and media
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Message {
    pub id: i32,
    pub date: DateTime<Utc>,
    pub text: String,
    pub media: MessageMedia,
}

#[derive(Debug, Clone)]
pub enum MessageMedia {
    Document(Document),
    Photo(Photo),
    None,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub id: i64,
    pub access_hash: i64,
    pub file_reference: Vec<u8>,
    pub mime_type: String,
    pub size: u64,
    /// Value of the file-name attribute, when the sender supplied one.
    pub file_name: Option<String>,
    pub thumbs: Vec<PhotoSize>,
}

#[derive(Debug, Clone)]
pub struct Photo {
    pub id: i64,
    pub access_hash: i64,
    pub file_reference: Vec<u8>,
    pub sizes: Vec<PhotoSize>,
}

/// One rendition of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoSize {
    Simple { kind: String, size: u32 },
    /// Progressive JPEG; `sizes` are the cumulative byte offsets of each
    /// scan, the last one being the full size.
    Progressive { kind: String, sizes: Vec<u32> },
}

impl PhotoSize {
    pub fn kind(&self) -> &str {
        match self {
            PhotoSize::Simple { kind, .. } | PhotoSize::Progressive { kind, .. } => kind,
        }
    }

    pub fn byte_size(&self) -> u32 {
        match self {
            PhotoSize::Simple { size, .. } => *size,
            PhotoSize::Progressive { sizes, .. } => sizes.last().copied().unwrap_or(0),
        }
    }
}

fn largest(sizes: &[PhotoSize]) -> Option<&PhotoSize> {
    sizes.iter().max_by_key(|s| s.byte_size())
}

/// Where the transport should fetch bytes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileLocation {
    Document {
        id: i64,
        access_hash: i64,
        file_reference: Vec<u8>,
        /// Thumbnail rendition to fetch instead of the document itself.
        thumb_size: Option<String>,
    },
    Photo {
        id: i64,
        access_hash: i64,
        file_reference: Vec<u8>,
        thumb_size: String,
    },
}

/// File attached to a message, as exposed to listings and content links.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub location: FileLocation,
}

/// Best thumbnail rendition for a message.
#[derive(Debug, Clone)]
pub struct ThumbnailRef {
    pub location: FileLocation,
    pub size: u32,
}

impl MessageMedia {
    pub fn file(&self) -> Option<MediaFile> {
        match self {
            MessageMedia::Document(doc) => Some(MediaFile {
                name: doc
                    .file_name
                    .clone()
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| format!("document_{}", doc.id)),
                mime_type: doc.mime_type.clone(),
                size: doc.size,
                location: FileLocation::Document {
                    id: doc.id,
                    access_hash: doc.access_hash,
                    file_reference: doc.file_reference.clone(),
                    thumb_size: None,
                },
            }),
            MessageMedia::Photo(photo) => {
                let best = largest(&photo.sizes)?;
                Some(MediaFile {
                    name: format!("photo_{}.jpg", photo.id),
                    mime_type: "image/jpeg".to_string(),
                    size: u64::from(best.byte_size()),
                    location: FileLocation::Photo {
                        id: photo.id,
                        access_hash: photo.access_hash,
                        file_reference: photo.file_reference.clone(),
                        thumb_size: best.kind().to_string(),
                    },
                })
            }
            MessageMedia::None => None,
        }
    }

    /// Largest thumbnail of a document, or largest size of a photo.
    pub fn thumbnail(&self) -> Option<ThumbnailRef> {
        match self {
            MessageMedia::Document(doc) => {
                let best = largest(&doc.thumbs)?;
                Some(ThumbnailRef {
                    location: FileLocation::Document {
                        id: doc.id,
                        access_hash: doc.access_hash,
                        file_reference: doc.file_reference.clone(),
                        thumb_size: Some(best.kind().to_string()),
                    },
                    size: best.byte_size(),
                })
            }
            MessageMedia::Photo(photo) => {
                let best = largest(&photo.sizes)?;
                Some(ThumbnailRef {
                    location: FileLocation::Photo {
                        id: photo.id,
                        access_hash: photo.access_hash,
                        file_reference: photo.file_reference.clone(),
                        thumb_size: best.kind().to_string(),
                    },
                    size: best.byte_size(),
                })
            }
            MessageMedia::None => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Virtual file system nodes
// ---------------------------------------------------------------------------

/// A folder or file as seen by the file-system layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualNode {
    /// Composite key (`peer`, `peer:YYYY-MM` or `peer:YYYY-MM:message`);
    /// empty for the root.
    pub id: String,
    pub name: String,
    pub is_folder: bool,
    pub modified_at: DateTime<Utc>,
    /// Byte size; zero for folders.
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl VirtualNode {
    pub fn folder(id: impl Into<String>, name: impl Into<String>, modified_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_folder: true,
            modified_at,
            size: 0,
            thumbnail_url: None,
        }
    }

    pub fn file(
        id: impl Into<String>,
        name: impl Into<String>,
        modified_at: DateTime<Utc>,
        size: u64,
        thumbnail_url: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_folder: false,
            modified_at,
            size,
            thumbnail_url,
        }
    }

    /// The synthetic root folder.
    pub fn root() -> Self {
        Self::folder("", "", DateTime::<Utc>::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(thumbs: Vec<PhotoSize>) -> Document {
        Document {
            id: 7,
            access_hash: 1,
            file_reference: vec![1, 2],
            mime_type: "application/pdf".into(),
            size: 2048,
            file_name: Some("report.pdf".into()),
            thumbs,
        }
    }

    #[test]
    fn test_user_display_name_skips_empty_parts() {
        let mut entities = Entities::default();
        entities.users.insert(
            1,
            User {
                id: 1,
                first_name: "Alice".into(),
                ..Default::default()
            },
        );
        let peer = Peer::new(1, PeerKind::User, 0);
        assert_eq!(entities.display_name(&peer), "Alice");
        assert_eq!(entities.category(&peer), PeerCategory::Private);
    }

    #[test]
    fn test_user_display_name_falls_back_to_username() {
        let mut entities = Entities::default();
        entities.users.insert(
            1,
            User {
                id: 1,
                username: Some("alice_w".into()),
                ..Default::default()
            },
        );
        assert_eq!(entities.display_name(&Peer::new(1, PeerKind::User, 0)), "alice_w");
    }

    #[test]
    fn test_megagroup_is_a_group() {
        let mut entities = Entities::default();
        entities.channels.insert(
            5,
            Channel {
                id: 5,
                title: "Devs".into(),
                megagroup: true,
                ..Default::default()
            },
        );
        let peer = Peer::new(5, PeerKind::Channel, 0);
        assert_eq!(entities.category(&peer), PeerCategory::Group);
        assert_eq!(entities.category(&Peer::new(6, PeerKind::Chat, 0)), PeerCategory::Unknown);
    }

    #[test]
    fn test_document_thumbnail_picks_largest() {
        let media = MessageMedia::Document(doc(vec![
            PhotoSize::Simple { kind: "s".into(), size: 100 },
            PhotoSize::Simple { kind: "m".into(), size: 900 },
            PhotoSize::Simple { kind: "x".into(), size: 400 },
        ]));
        let thumb = media.thumbnail().unwrap();
        assert_eq!(thumb.size, 900);
        assert!(matches!(
            thumb.location,
            FileLocation::Document { thumb_size: Some(ref k), .. } if k == "m"
        ));
    }

    #[test]
    fn test_photo_file_uses_progressive_size() {
        let media = MessageMedia::Photo(Photo {
            id: 3,
            access_hash: 0,
            file_reference: vec![],
            sizes: vec![
                PhotoSize::Simple { kind: "m".into(), size: 5_000 },
                PhotoSize::Progressive { kind: "y".into(), sizes: vec![1_000, 20_000, 60_000] },
            ],
        });
        let file = media.file().unwrap();
        assert_eq!(file.size, 60_000);
        assert_eq!(file.name, "photo_3.jpg");
        assert_eq!(file.mime_type, "image/jpeg");
    }

    #[test]
    fn test_document_without_thumbs_has_no_thumbnail() {
        assert!(MessageMedia::Document(doc(vec![])).thumbnail().is_none());
        assert!(MessageMedia::None.file().is_none());
    }
}
