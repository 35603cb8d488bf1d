//! Dual-mode store
//!
//! Routes each flow to the relational store when it answers a probe and to
//! the JSON-file fallback otherwise. A flow calls [`DualModeStore::select`]
//! once and uses the returned [`Backend`] for every step, so one request
//! never mixes backends. There is no replication between the two: records
//! written while degraded stay in the files.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use crate::domain::entity::{identity::Identity, one_time_token::OneTimeToken, session::Session};
use crate::domain::repository::{ConnectivityProbe, IdentityRepository, SessionRepository};
use crate::domain::value_object::{
    email::Email,
    permission::RoleDefinition,
    user_id::{SessionId, UserId},
    user_password::UserPassword,
    user_role::UserRole,
};
use crate::error::AuthResult;
use crate::infra::file::FileAuthStore;

/// What the relational side of a [`DualModeStore`] must provide
pub trait PrimaryStore:
    ConnectivityProbe + IdentityRepository + SessionRepository + Send + Sync + 'static
{
}

impl<T> PrimaryStore for T where
    T: ConnectivityProbe + IdentityRepository + SessionRepository + Send + Sync + 'static
{
}

pub struct DualModeStore<P> {
    primary: P,
    fallback: FileAuthStore,
    degraded: AtomicBool,
}

impl<P: PrimaryStore> DualModeStore<P> {
    pub fn new(primary: P, fallback: FileAuthStore) -> Self {
        Self {
            primary,
            fallback,
            degraded: AtomicBool::new(false),
        }
    }

    /// Probe the relational store once and pick the backend for this flow.
    pub async fn select(&self) -> Backend<'_, P> {
        if self.primary.probe().await {
            if self.degraded.swap(false, Ordering::AcqRel) {
                tracing::info!("Relational store reachable again, leaving fallback mode");
            }
            Backend::Relational(&self.primary)
        } else {
            if !self.degraded.swap(true, Ordering::AcqRel) {
                tracing::warn!(
                    users_file = %self.fallback.users_path().display(),
                    "Relational store unreachable, serving from fallback files"
                );
            }
            Backend::File(&self.fallback)
        }
    }

    /// Whether the last selection fell back to files
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    /// Sweep dead sessions from the fallback files and, if reachable, the
    /// relational store. Returns the total removed.
    pub async fn sweep_all(&self) -> AuthResult<u64> {
        let mut removed = self.fallback.sweep_expired_sessions().await?;
        if self.primary.probe().await {
            removed += self.primary.sweep_expired_sessions().await?;
        }
        Ok(removed)
    }
}

/// The backend one flow runs against
pub enum Backend<'a, P> {
    Relational(&'a P),
    File(&'a FileAuthStore),
}

impl<P> Backend<'_, P> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Backend::File(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Relational(_) => "relational",
            Backend::File(_) => "file",
        }
    }
}

macro_rules! route {
    ($backend:expr, $store:ident => $call:expr) => {
        match $backend {
            Backend::Relational($store) => $call,
            Backend::File($store) => $call,
        }
    };
}

// ============================================================================
// Identity Repository Implementation
// ============================================================================

impl<P> IdentityRepository for Backend<'_, P>
where
    P: IdentityRepository + Sync,
{
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<Identity>> {
        route!(self, s => s.find_by_email(email).await)
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<Identity>> {
        route!(self, s => s.find_by_id(user_id).await)
    }

    async fn create(&self, identity: &Identity) -> AuthResult<()> {
        route!(self, s => s.create(identity).await)
    }

    async fn update_last_login(&self, user_id: &UserId, at: DateTime<Utc>) -> AuthResult<()> {
        route!(self, s => s.update_last_login(user_id, at).await)
    }

    async fn update_password(&self, user_id: &UserId, password: &UserPassword) -> AuthResult<()> {
        route!(self, s => s.update_password(user_id, password).await)
    }

    async fn set_role(&self, user_id: &UserId, role: UserRole) -> AuthResult<()> {
        route!(self, s => s.set_role(user_id, role).await)
    }

    async fn set_active(&self, user_id: &UserId, active: bool) -> AuthResult<()> {
        route!(self, s => s.set_active(user_id, active).await)
    }

    async fn set_reset_token(&self, user_id: &UserId, token: &OneTimeToken) -> AuthResult<()> {
        route!(self, s => s.set_reset_token(user_id, token).await)
    }

    async fn find_by_reset_token(&self, digest: &str) -> AuthResult<Option<Identity>> {
        route!(self, s => s.find_by_reset_token(digest).await)
    }

    async fn consume_reset_token(
        &self,
        user_id: &UserId,
        digest: &str,
        password: &UserPassword,
    ) -> AuthResult<bool> {
        route!(self, s => s.consume_reset_token(user_id, digest, password).await)
    }

    async fn set_verification_token(
        &self,
        user_id: &UserId,
        token: &OneTimeToken,
    ) -> AuthResult<()> {
        route!(self, s => s.set_verification_token(user_id, token).await)
    }

    async fn find_by_verification_token(&self, digest: &str) -> AuthResult<Option<Identity>> {
        route!(self, s => s.find_by_verification_token(digest).await)
    }

    async fn consume_verification_token(
        &self,
        user_id: &UserId,
        digest: &str,
    ) -> AuthResult<bool> {
        route!(self, s => s.consume_verification_token(user_id, digest).await)
    }

    async fn load_roles(&self) -> AuthResult<Vec<RoleDefinition>> {
        route!(self, s => s.load_roles().await)
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

impl<P> SessionRepository for Backend<'_, P>
where
    P: SessionRepository + Sync,
{
    async fn create_session(&self, session: &Session) -> AuthResult<()> {
        route!(self, s => s.create_session(session).await)
    }

    async fn find_active_session(&self, token_digest: &str) -> AuthResult<Option<Session>> {
        route!(self, s => s.find_active_session(token_digest).await)
    }

    async fn touch_session(&self, session_id: &SessionId) -> AuthResult<()> {
        route!(self, s => s.touch_session(session_id).await)
    }

    async fn invalidate_session(&self, session_id: &SessionId) -> AuthResult<bool> {
        route!(self, s => s.invalidate_session(session_id).await)
    }

    async fn invalidate_session_by_token(&self, token_digest: &str) -> AuthResult<bool> {
        route!(self, s => s.invalidate_session_by_token(token_digest).await)
    }

    async fn invalidate_all_sessions(&self, user_id: &UserId) -> AuthResult<u64> {
        route!(self, s => s.invalidate_all_sessions(user_id).await)
    }

    async fn list_active_sessions(&self, user_id: &UserId) -> AuthResult<Vec<Session>> {
        route!(self, s => s.list_active_sessions(user_id).await)
    }

    async fn sweep_expired_sessions(&self) -> AuthResult<u64> {
        route!(self, s => s.sweep_expired_sessions().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::identity::tests::identity;
    use crate::infra::simulated::SimulatedPrimary;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> DualModeStore<SimulatedPrimary> {
        DualModeStore::new(
            SimulatedPrimary::in_dir(dir.path().join("primary")),
            FileAuthStore::in_dir(dir.path().join("fallback")),
        )
    }

    #[tokio::test]
    async fn test_selects_relational_when_reachable() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let backend = store.select().await;
        assert!(!backend.is_fallback());
        assert_eq!(backend.name(), "relational");
        assert!(!store.is_degraded());
    }

    #[tokio::test]
    async fn test_falls_back_and_recovers() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.primary().set_reachable(false);
        assert!(store.select().await.is_fallback());
        assert!(store.is_degraded());

        store.primary().set_reachable(true);
        assert!(!store.select().await.is_fallback());
        assert!(!store.is_degraded());
    }

    #[tokio::test]
    async fn test_one_probe_per_selection() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let backend = store.select().await;
        let ada = identity("ada@example.com", "Str0ng!1").await;
        backend.create(&ada).await.unwrap();
        backend.find_by_id(&ada.id).await.unwrap();

        assert_eq!(store.primary().probe_count(), 1);
    }

    #[tokio::test]
    async fn test_no_replication_between_backends() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let ada = identity("ada@example.com", "Str0ng!1").await;

        store.primary().set_reachable(false);
        store.select().await.create(&ada).await.unwrap();

        store.primary().set_reachable(true);
        let found = store.select().await.find_by_email(&ada.email).await.unwrap();
        assert!(found.is_none());
    }
}
