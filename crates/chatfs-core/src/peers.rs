//! Peer token resolution.
//!
//! Numeric ids live in overlapping namespaces with no single authoritative
//! lookup, so a numeric token is tried as a channel, then a user, then a
//! basic chat. Anything that is not a base-10 integer is a username.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{DriveError, Result};
use crate::model::Peer;
use crate::upstream::Upstream;

#[derive(Clone)]
pub struct PeerResolver {
    upstream: Arc<dyn Upstream>,
}

impl PeerResolver {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }

    pub async fn resolve(&self, token: &str) -> Result<Peer> {
        let Ok(id) = token.parse::<i64>() else {
            // username errors are surfaced unchanged
            return Ok(self.upstream.resolve_username(token).await?);
        };

        let last_error = match self.upstream.resolve_channel(id).await {
            Ok(peer) => return Ok(peer),
            Err(e) => e,
        };
        debug!(id, error = %last_error, "Not a channel id, trying user");

        let last_error = match self.upstream.resolve_user(id).await {
            Ok(peer) => return Ok(peer),
            Err(e) => e,
        };
        debug!(id, error = %last_error, "Not a user id, trying chat");

        match self.upstream.resolve_chat(id).await {
            Ok(peer) => Ok(peer),
            Err(last_error) => {
                warn!(id, error = %last_error, "Peer id did not resolve in any namespace");
                Err(DriveError::PeerNotFound { id, last_error })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PeerKind;
    use crate::testing::{ts, Call, FakeUpstream};
    use crate::upstream::UpstreamError;

    #[tokio::test]
    async fn test_numeric_falls_back_channel_user_chat() {
        let mut fake = FakeUpstream::new();
        fake.add_chat_dialog(77, "Family", ts(2023, 1, 1));
        let fake = Arc::new(fake);

        let peer = PeerResolver::new(fake.clone()).resolve("77").await.unwrap();
        assert_eq!(peer.id, 77);
        assert_eq!(peer.kind, PeerKind::Chat);
        assert_eq!(
            fake.calls(),
            vec![Call::ResolveChannel(77), Call::ResolveUser(77), Call::ResolveChat(77)]
        );
    }

    #[tokio::test]
    async fn test_channel_wins_first() {
        let mut fake = FakeUpstream::new();
        fake.add_channel_dialog(5, "News", false, ts(2023, 1, 1));
        let fake = Arc::new(fake);

        let peer = PeerResolver::new(fake.clone()).resolve("5").await.unwrap();
        assert_eq!(peer.kind, PeerKind::Channel);
        assert_eq!(fake.calls(), vec![Call::ResolveChannel(5)]);
    }

    #[tokio::test]
    async fn test_unknown_id_reports_last_error() {
        let fake = Arc::new(FakeUpstream::new());
        let err = PeerResolver::new(fake).resolve("404").await.unwrap_err();
        match err {
            DriveError::PeerNotFound { id, last_error } => {
                assert_eq!(id, 404);
                assert_eq!(
                    last_error,
                    UpstreamError::Rpc {
                        code: 400,
                        message: "CHAT_ID_INVALID".into()
                    }
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_username_path() {
        let mut fake = FakeUpstream::new();
        fake.usernames
            .insert("durov".into(), Peer::new(1, PeerKind::User, 9));
        let fake = Arc::new(fake);
        let resolver = PeerResolver::new(fake.clone());

        assert_eq!(resolver.resolve("durov").await.unwrap().id, 1);
        assert!(matches!(
            resolver.resolve("nobody_here").await,
            Err(DriveError::Upstream(UpstreamError::Rpc { .. }))
        ));
        assert_eq!(fake.count(|c| matches!(c, Call::ResolveChannel(_))), 0);
    }
}
