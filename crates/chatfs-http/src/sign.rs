//! Keyed-hash link signatures.
//!
//! A signature is the BLAKE3 keyed hash of the unencoded virtual path,
//! URL-safe base64 without padding. Links carry no expiry; rotating the key
//! invalidates every outstanding link.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chatfs_core::LinkSigner;
use subtle::ConstantTimeEq;

use crate::config::HttpConfig;

pub struct Blake3Signer {
    key: [u8; 32],
}

impl Blake3Signer {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Signer keyed by `LINK_SIGN_KEY`, or by a fresh random key when none
    /// is configured.
    pub fn from_config(config: &HttpConfig) -> Self {
        match config.link_sign_key {
            Some(key) => Self::new(key),
            None => {
                tracing::warn!("No LINK_SIGN_KEY configured, signed links will not survive a restart");
                Self::new(rand::random())
            }
        }
    }

    /// Check `signature` against `path` in constant time.
    pub fn verify(&self, path: &str, signature: &str) -> bool {
        let expected = self.sign(path);
        let expected = expected.as_bytes();
        let given = signature.as_bytes();
        given.len() == expected.len() && given.ct_eq(expected).unwrap_u8() == 1
    }
}

impl LinkSigner for Blake3Signer {
    fn sign(&self, path: &str) -> String {
        let hash = blake3::keyed_hash(&self.key, path.as_bytes());
        URL_SAFE_NO_PAD.encode(hash.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signer = Blake3Signer::new([7u8; 32]);
        let sig = signer.sign("/News ChatChannel/2022-11/report.pdf");
        assert_eq!(sig.len(), 43);
        assert!(signer.verify("/News ChatChannel/2022-11/report.pdf", &sig));
        assert!(!signer.verify("/News ChatChannel/2022-11/other.pdf", &sig));
        assert!(!signer.verify("/News ChatChannel/2022-11/report.pdf", ""));
    }

    #[test]
    fn test_keys_are_not_interchangeable() {
        let a = Blake3Signer::new([1u8; 32]);
        let b = Blake3Signer::new([2u8; 32]);
        assert!(!b.verify("/x", &a.sign("/x")));
    }

    #[test]
    fn test_from_config_uses_configured_key() {
        let config = HttpConfig {
            link_sign_key: Some([9u8; 32]),
            ..HttpConfig::default()
        };
        let signer = Blake3Signer::from_config(&config);
        assert!(Blake3Signer::new([9u8; 32]).verify("/a", &signer.sign("/a")));
    }
}
