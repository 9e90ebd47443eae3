//! Serving configuration loaded from environment variables.

use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Socket address for the HTTP (axum) server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:5244`
    pub http_addr: SocketAddr,

    /// Public base URL of this server, prefixed to thumbnail links.
    /// Env: `API_BASE_URL`
    /// Default: `http://127.0.0.1:5244`
    pub api_base_url: String,

    /// BLAKE3 key for link signatures (hex-encoded, 64 chars).
    /// Env: `LINK_SIGN_KEY`
    /// Default: none; a random key is generated at startup, so links do
    /// not survive a restart.
    pub link_sign_key: Option<[u8; 32]>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 5244).into(),
            api_base_url: "http://127.0.0.1:5244".to_string(),
            link_sign_key: None,
        }
    }
}

impl HttpConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(url) = std::env::var("API_BASE_URL") {
            if !url.trim().is_empty() {
                config.api_base_url = url.trim().to_string();
            }
        }

        if let Ok(hex_key) = std::env::var("LINK_SIGN_KEY") {
            match parse_hex_key(&hex_key) {
                Ok(key) => config.link_sign_key = Some(key),
                Err(e) => tracing::warn!(error = %e, "Invalid LINK_SIGN_KEY, using a random key"),
            }
        }

        config
    }
}

/// Parse a 64-character hex string into a 32-byte key.
fn parse_hex_key(hex: &str) -> Result<[u8; 32], String> {
    let hex = hex.trim();
    if hex.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", hex.len()));
    }
    let bytes = hex::decode(hex).map_err(|e| format!("invalid hex: {e}"))?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}
