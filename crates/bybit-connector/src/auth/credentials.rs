/*
[INPUT]:  API key and secret supplied by the caller
[OUTPUT]: Shared, read-only credentials with a redacted Debug impl
[POS]:    Auth layer - key material shared by REST and WebSocket sessions
[UPDATE]: When adding new credential kinds
*/

use std::fmt;
use std::sync::Arc;

use super::HmacSigner;

/// API key pair. The secret is never exposed through `Debug`.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    signer: Arc<HmacSigner>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            signer: Arc::new(HmacSigner::new(api_secret)),
        }
    }

    /// Read `BYBIT_API_KEY` / `BYBIT_API_SECRET`; `None` unless both are set.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var("BYBIT_API_KEY").ok()?;
        let secret = std::env::var("BYBIT_API_SECRET").ok()?;
        if key.is_empty() || secret.is_empty() {
            return None;
        }
        Some(Self::new(key, secret))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn signer(&self) -> &HmacSigner {
        &self.signer
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let credentials = Credentials::new("key", "super-secret");
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("key"));
        assert!(!rendered.contains("super-secret"));
    }
}
