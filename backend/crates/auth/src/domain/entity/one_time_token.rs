//! One-Time Token
//!
//! Password-reset and email-verification tokens. The raw token goes to the
//! user by email; only its SHA-256 digest is stored.

use chrono::{DateTime, Duration, Utc};
use platform::crypto::{random_token, sha256_hex};

/// Random bytes per token
const TOKEN_BYTES: usize = 32;

/// Stored half of a one-time token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneTimeToken {
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

impl OneTimeToken {
    /// Mint a token valid for `ttl`. Returns the raw token (to send) and the
    /// stored half.
    pub fn issue(ttl: Duration) -> (String, Self) {
        let raw = random_token(TOKEN_BYTES);
        let token = Self {
            digest: Self::digest_of(&raw),
            expires_at: Utc::now() + ttl,
        };
        (raw, token)
    }

    pub fn digest_of(raw: &str) -> String {
        sha256_hex(raw.as_bytes())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Usable iff `raw` hashes to this digest and the token has not expired.
    pub fn accepts(&self, raw_digest: &str, now: DateTime<Utc>) -> bool {
        self.digest == raw_digest && !self.is_expired_at(now)
    }
}
