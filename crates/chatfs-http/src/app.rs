//! Startup for binaries embedding the drive: configuration from the
//! environment, state wiring, and the server loop with Ctrl+C shutdown.

use std::sync::Arc;

use chatfs_core::{ChatDrive, DriveConfig, ThumbnailUrls, Upstream};
use tracing::info;

use crate::api::{serve, AppState};
use crate::config::HttpConfig;
use crate::sign::Blake3Signer;
use crate::telemetry;

/// Wire a drive over `upstream` and its HTTP state. Must be called from
/// within a tokio runtime.
pub fn build_state(upstream: Arc<dyn Upstream>, drive_config: &DriveConfig, http_config: HttpConfig) -> AppState {
    let signer = Arc::new(Blake3Signer::from_config(&http_config));
    let urls = ThumbnailUrls::new(http_config.api_base_url.clone(), signer.clone());
    let drive = Arc::new(ChatDrive::new(upstream, urls, drive_config));
    AppState::new(drive, signer, http_config)
}

/// Serve a drive over `upstream` until the server fails or Ctrl+C arrives.
/// Open transfers are cancelled before the server drains.
pub async fn run(upstream: Arc<dyn Upstream>) -> anyhow::Result<()> {
    telemetry::init();
    info!("Starting chatfs v{}", env!("CARGO_PKG_VERSION"));

    let drive_config = DriveConfig::from_env();
    let http_config = HttpConfig::from_env();
    info!(
        addr = %http_config.http_addr,
        base_url = %http_config.api_base_url,
        signing_key_configured = http_config.link_sign_key.is_some(),
        "Loaded configuration"
    );

    let addr = http_config.http_addr;
    let state = build_state(upstream, &drive_config, http_config);
    let shutdown = state.shutdown.clone();

    let server = serve(state, addr);
    tokio::pin!(server);
    tokio::select! {
        result = &mut server => {
            if let Err(e) = &result {
                tracing::error!(error = %e, "HTTP server failed");
            }
            return result;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    shutdown.cancel();
    server.await
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chatfs_core::testing::{ts, FakeUpstream};

    #[tokio::test]
    async fn test_build_state_uses_configured_key_and_base_url() {
        let mut fake = FakeUpstream::new();
        fake.add_channel_dialog(1001, "News", false, ts(2023, 3, 1));
        fake.add_document_with_thumb(1001, 7, ts(2022, 11, 20), "clip.mp4", Bytes::from_static(b"jpeg"));
        let config = HttpConfig {
            api_base_url: "https://files.example".to_string(),
            link_sign_key: Some([9u8; 32]),
            ..HttpConfig::default()
        };

        let state = build_state(Arc::new(fake), &DriveConfig::default(), config);
        let files = state.drive.list("1001:2022-11", "/News ChatChannel/2022-11").await.unwrap();
        let url = files[0].thumbnail_url.as_deref().unwrap();
        let (prefix, sig) = url.split_once("&sign=").unwrap();
        assert_eq!(prefix, "https://files.example/p/News%20ChatChannel/2022-11/clip.mp4?type=thumb");

        let expected = Blake3Signer::new([9u8; 32]);
        assert!(expected.verify("/News ChatChannel/2022-11/clip.mp4", sig));
        assert!(state.signer.verify("/News ChatChannel/2022-11/clip.mp4", sig));
    }

    #[tokio::test]
    async fn test_build_state_without_key_still_signs_consistently() {
        let state = build_state(Arc::new(FakeUpstream::new()), &DriveConfig::default(), HttpConfig::default());
        let sig = chatfs_core::LinkSigner::sign(state.signer.as_ref(), "/a/b.pdf");
        assert!(state.signer.verify("/a/b.pdf", &sig));
        assert!(!state.shutdown.is_cancelled());
    }
}
