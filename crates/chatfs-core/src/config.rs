//! Adapter configuration loaded from environment variables.
//!
//! The credential fields are consumed by the transport and the login flow,
//! not by the core; they must stay unchanged across restarts or the session
//! has to be re-authorised.

use std::time::Duration;

use crate::cache::{DEFAULT_TTL, SWEEP_INTERVAL};
use crate::error::{DriveError, Result};
use crate::ids::Period;
use crate::pager::DEFAULT_BATCH_SIZE;

/// Fixed bounds for the period folders of every chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindow {
    pub first: Period,
    pub last: Period,
}

impl PeriodWindow {
    /// Parse `YYYY-MM..YYYY-MM`.
    pub fn parse(s: &str) -> Result<Self> {
        let (first, last) = s
            .trim()
            .split_once("..")
            .ok_or_else(|| DriveError::Config(format!("expected YYYY-MM..YYYY-MM, got {s:?}")))?;
        let first: Period = first
            .parse()
            .map_err(|e| DriveError::Config(format!("window start: {e}")))?;
        let last: Period = last
            .parse()
            .map_err(|e| DriveError::Config(format!("window end: {e}")))?;
        if last < first {
            return Err(DriveError::Config(format!("window ends before it starts: {s:?}")));
        }
        Ok(Self { first, last })
    }
}

#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// Numeric application id.
    /// Env: `CHATFS_API_ID`
    pub api_id: i32,

    /// Application secret.
    /// Env: `CHATFS_API_HASH`
    pub api_hash: String,

    /// Phone number used for interactive login.
    /// Env: `CHATFS_PHONE`
    pub phone_number: String,

    /// One-time login code.
    /// Env: `CHATFS_AUTH_CODE`
    pub auth_code: String,

    /// Base64 session blob from a previous run; empty on first start.
    /// Env: `CHATFS_SESSION`
    pub session: String,

    /// TTL of listing snapshots.
    /// Env: `CHATFS_LISTING_TTL_SECS`
    /// Default: 300
    pub listing_ttl: Duration,

    /// TTL of cached thumbnail bytes.
    /// Env: `CHATFS_THUMBNAIL_TTL_SECS`
    /// Default: 3600
    pub thumbnail_ttl: Duration,

    /// Interval of the cache sweep.
    /// Env: `CHATFS_CACHE_SWEEP_SECS`
    /// Default: 600
    pub sweep_interval: Duration,

    /// Page size for dialog and message queries.
    /// Env: `CHATFS_BATCH_SIZE`
    /// Default: 100
    pub batch_size: usize,

    /// Pins the period folders instead of deriving them from each chat's
    /// document history.
    /// Env: `CHATFS_PERIOD_WINDOW` (`YYYY-MM..YYYY-MM`)
    pub period_window: Option<PeriodWindow>,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_id: 0,
            api_hash: String::new(),
            phone_number: String::new(),
            auth_code: String::new(),
            session: String::new(),
            listing_ttl: DEFAULT_TTL,
            thumbnail_ttl: Duration::from_secs(60 * 60),
            sweep_interval: SWEEP_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            period_window: None,
        }
    }
}

impl DriveConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CHATFS_API_ID") {
            match val.trim().parse::<i32>() {
                Ok(id) => config.api_id = id,
                Err(_) => tracing::warn!(value = %val, "Invalid CHATFS_API_ID, ignoring"),
            }
        }

        if let Ok(hash) = std::env::var("CHATFS_API_HASH") {
            config.api_hash = hash;
        }

        if let Ok(phone) = std::env::var("CHATFS_PHONE") {
            config.phone_number = phone;
        }

        if let Ok(code) = std::env::var("CHATFS_AUTH_CODE") {
            config.auth_code = code;
        }

        if let Ok(session) = std::env::var("CHATFS_SESSION") {
            config.session = session;
        }

        if let Some(ttl) = secs_from_env("CHATFS_LISTING_TTL_SECS") {
            config.listing_ttl = ttl;
        }

        if let Some(ttl) = secs_from_env("CHATFS_THUMBNAIL_TTL_SECS") {
            config.thumbnail_ttl = ttl;
        }

        if let Some(every) = secs_from_env("CHATFS_CACHE_SWEEP_SECS") {
            config.sweep_interval = every;
        }

        if let Ok(val) = std::env::var("CHATFS_BATCH_SIZE") {
            match val.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.batch_size = n,
                _ => tracing::warn!(value = %val, "Invalid CHATFS_BATCH_SIZE, using default"),
            }
        }

        if let Ok(val) = std::env::var("CHATFS_PERIOD_WINDOW") {
            match PeriodWindow::parse(&val) {
                Ok(window) => config.period_window = Some(window),
                Err(e) => tracing::warn!(error = %e, "Invalid CHATFS_PERIOD_WINDOW, deriving windows"),
            }
        }

        config
    }
}

fn secs_from_env(name: &str) -> Option<Duration> {
    let val = std::env::var(name).ok()?;
    match parse_secs(&val) {
        Some(d) => Some(d),
        None => {
            tracing::warn!(var = name, value = %val, "Invalid duration, using default");
            None
        }
    }
}

fn parse_secs(val: &str) -> Option<Duration> {
    match val.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        _ => None,
    }
}
