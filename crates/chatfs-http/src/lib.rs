//! # chatfs-http
//!
//! HTTP front for a [`chatfs_core::ChatDrive`]:
//! - **`/fs/list`** returns the JSON listing of a virtual directory
//! - **`/p/*path`** streams file content or thumbnails behind a signed link
//! - **`/health`** for liveness probes
//!
//! [`run`] starts the whole server from environment configuration for a
//! binary that supplies its own [`chatfs_core::Upstream`].

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod sign;
pub mod telemetry;

pub use api::{build_router, serve, AppState};
pub use app::{build_state, run};
pub use config::HttpConfig;
pub use error::HttpError;
pub use sign::Blake3Signer;
