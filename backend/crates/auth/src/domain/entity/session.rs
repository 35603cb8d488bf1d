//! Session Entity
//!
//! Server-side record of an issued refresh token. Only the token's SHA-256
//! digest is stored, so a leaked table cannot be replayed.

use chrono::{DateTime, Duration, Utc};
use platform::client::ClientInfo;
use platform::crypto::sha256_hex;

use crate::domain::value_object::user_id::{SessionId, UserId};

#[derive(Debug, Clone)]
pub struct Session {
    /// Also embedded in both tokens of the pair as `sid`
    pub id: SessionId,
    pub user_id: UserId,
    pub token_digest: String,
    /// User-Agent at issue time
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl Session {
    /// Create a new active session for an issued refresh token.
    ///
    /// TTL is provided by the application layer (config), not hard-coded here.
    /// A non-positive TTL is bumped to one second to keep
    /// `expires_at > created_at`.
    pub fn new(
        id: SessionId,
        user_id: UserId,
        refresh_token: &str,
        client: &ClientInfo,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        let ttl = ttl.max(Duration::seconds(1));

        Self {
            id,
            user_id,
            token_digest: Self::digest_of(refresh_token),
            device_info: client.user_agent.clone(),
            ip_address: client.ip_string(),
            is_active: true,
            expires_at: now + ttl,
            created_at: now,
            last_used_at: now,
        }
    }

    pub fn digest_of(refresh_token: &str) -> String {
        sha256_hex(refresh_token.as_bytes())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Active and unexpired
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now)
    }

    /// Candidate for the expiry sweep
    pub fn is_sweepable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_usable_at(now)
    }
}
