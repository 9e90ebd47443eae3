//! Read-only virtual file system over a chat service.
//!
//! Dialogs become root folders, each chat is split into calendar-month
//! folders, and every document or photo posted in a month becomes a file.
//! Content and thumbnails are streamed from the upstream session on
//! demand; listings and thumbnails are cached for a short while.

pub mod cache;
pub mod config;
pub mod content;
pub mod dialogs;
pub mod drive;
pub mod error;
pub mod ids;
pub mod model;
pub mod pager;
pub mod peers;
pub mod periods;
pub mod session;
pub mod sign;
pub mod stream;
pub mod thumbnail;
pub mod upstream;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use cache::{CachedValue, DriveCache, ExpiringCache};
pub use config::{DriveConfig, PeriodWindow};
pub use drive::ChatDrive;
pub use error::{DriveError, Result};
pub use ids::{CompositeKey, Period};
pub use model::VirtualNode;
pub use session::{ConfigSessionStore, SessionStore};
pub use sign::{LinkSigner, ThumbnailUrls};
pub use stream::{ByteStream, Link, LinkHeaders, LinkKind};
pub use upstream::{Upstream, UpstreamError};
