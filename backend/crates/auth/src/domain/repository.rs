//! Repository Traits
//!
//! Interfaces for data persistence. Implementations are in the
//! infrastructure layer: the relational store, the JSON-file fallback, and
//! `infra::dual::Backend`, which routes to whichever one a flow selected.
//!
//! Method names are distinct across the two traits because `Backend`
//! implements both.

use chrono::{DateTime, Utc};

use crate::domain::entity::{identity::Identity, one_time_token::OneTimeToken, session::Session};
use crate::domain::value_object::{
    email::Email,
    permission::RoleDefinition,
    user_id::{SessionId, UserId},
    user_password::UserPassword,
    user_role::UserRole,
};
use crate::error::AuthResult;

/// Cheap liveness check against a backend.
#[trait_variant::make(ConnectivityProbe: Send)]
pub trait LocalConnectivityProbe {
    /// One bounded round-trip. Never retries, never caches.
    async fn probe(&self) -> bool;
}

/// Identity persistence
#[trait_variant::make(IdentityRepository: Send)]
pub trait LocalIdentityRepository {
    /// Case-insensitive lookup
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<Identity>>;

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<Identity>>;

    /// Insert. Fails with `AuthError::EmailTaken` on a duplicate email.
    async fn create(&self, identity: &Identity) -> AuthResult<()>;

    async fn update_last_login(&self, user_id: &UserId, at: DateTime<Utc>) -> AuthResult<()>;

    /// Replace the password hash; clears any outstanding reset token.
    async fn update_password(&self, user_id: &UserId, password: &UserPassword) -> AuthResult<()>;

    /// Fails with `AuthError::UserNotFound` if there is no such identity.
    async fn set_role(&self, user_id: &UserId, role: UserRole) -> AuthResult<()>;

    /// Soft delete / restore. Fails with `AuthError::UserNotFound`.
    async fn set_active(&self, user_id: &UserId, active: bool) -> AuthResult<()>;

    async fn set_reset_token(&self, user_id: &UserId, token: &OneTimeToken) -> AuthResult<()>;

    /// Identity holding an unexpired reset token with this digest
    async fn find_by_reset_token(&self, digest: &str) -> AuthResult<Option<Identity>>;

    /// Set the new password and null the token in one write. Returns `false`
    /// if the token was already consumed or has expired.
    async fn consume_reset_token(
        &self,
        user_id: &UserId,
        digest: &str,
        password: &UserPassword,
    ) -> AuthResult<bool>;

    async fn set_verification_token(
        &self,
        user_id: &UserId,
        token: &OneTimeToken,
    ) -> AuthResult<()>;

    /// Identity holding an unexpired verification token with this digest
    async fn find_by_verification_token(&self, digest: &str) -> AuthResult<Option<Identity>>;

    /// Mark verified and null the token in one write. Returns `false` if the
    /// token is no longer usable.
    async fn consume_verification_token(&self, user_id: &UserId, digest: &str)
    -> AuthResult<bool>;

    /// Role reference data, if this backend carries any
    async fn load_roles(&self) -> AuthResult<Vec<RoleDefinition>>;
}

/// Refresh-token session persistence
#[trait_variant::make(SessionRepository: Send)]
pub trait LocalSessionRepository {
    async fn create_session(&self, session: &Session) -> AuthResult<()>;

    /// Active, unexpired session for a refresh-token digest
    async fn find_active_session(&self, token_digest: &str) -> AuthResult<Option<Session>>;

    async fn touch_session(&self, session_id: &SessionId) -> AuthResult<()>;

    /// Flip active to false. Idempotent; returns whether this call did it.
    async fn invalidate_session(&self, session_id: &SessionId) -> AuthResult<bool>;

    /// Same as [`invalidate_session`](Self::invalidate_session), keyed by
    /// refresh-token digest
    async fn invalidate_session_by_token(&self, token_digest: &str) -> AuthResult<bool>;

    /// Returns how many sessions were flipped
    async fn invalidate_all_sessions(&self, user_id: &UserId) -> AuthResult<u64>;

    async fn list_active_sessions(&self, user_id: &UserId) -> AuthResult<Vec<Session>>;

    /// Delete inactive or expired sessions. Never touches a usable one.
    async fn sweep_expired_sessions(&self) -> AuthResult<u64>;
}
