//! Session blob persistence.
//!
//! The transport hands the session state over as an opaque byte buffer.
//! This crate only frames it: the buffer is kept base64-encoded so it fits
//! the string-valued `session` configuration field.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::DriveConfig;
use crate::error::{DriveError, Result};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The stored blob, or `None` on first run.
    async fn load(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the stored blob. Called after every successful update.
    async fn store(&self, data: &[u8]) -> Result<()>;
}

/// Keeps the session in memory, base64-encoded.
#[derive(Debug, Default)]
pub struct ConfigSessionStore {
    encoded: RwLock<String>,
}

impl ConfigSessionStore {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self {
            encoded: RwLock::new(encoded.into()),
        }
    }

    pub fn from_config(config: &DriveConfig) -> Self {
        Self::new(config.session.clone())
    }

    /// Current encoded form, for writing back into configuration.
    pub async fn encoded(&self) -> String {
        self.encoded.read().await.clone()
    }
}

#[async_trait]
impl SessionStore for ConfigSessionStore {
    async fn load(&self) -> Result<Option<Vec<u8>>> {
        let encoded = self.encoded.read().await;
        if encoded.trim().is_empty() {
            debug!("No stored session");
            return Ok(None);
        }
        let data = STANDARD
            .decode(encoded.trim())
            .map_err(|e| DriveError::Session(format!("invalid base64 session: {e}")))?;
        Ok(Some(data))
    }

    async fn store(&self, data: &[u8]) -> Result<()> {
        let mut encoded = self.encoded.write().await;
        *encoded = STANDARD.encode(data);
        info!(size = data.len(), "Session updated");
        Ok(())
    }
}
