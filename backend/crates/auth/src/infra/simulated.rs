//! Test stand-in for the relational store
//!
//! A file store in its own directory whose probe answers from a switch, so
//! tests can take the "database" down and bring it back.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};

use crate::domain::entity::{identity::Identity, one_time_token::OneTimeToken, session::Session};
use crate::domain::repository::{ConnectivityProbe, IdentityRepository, SessionRepository};
use crate::domain::value_object::{
    email::Email,
    permission::{PermissionList, RoleDefinition},
    user_id::{SessionId, UserId},
    user_password::UserPassword,
    user_role::UserRole,
};
use crate::error::AuthResult;
use crate::infra::file::FileAuthStore;

pub(crate) struct SimulatedPrimary {
    inner: FileAuthStore,
    reachable: AtomicBool,
    probes: AtomicUsize,
    roles: Vec<RoleDefinition>,
}

impl SimulatedPrimary {
    pub(crate) fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            inner: FileAuthStore::in_dir(dir),
            reachable: AtomicBool::new(true),
            probes: AtomicUsize::new(0),
            roles: Vec::new(),
        }
    }

    pub(crate) fn with_roles(mut self, roles: Vec<(&str, &[&str])>) -> Self {
        self.roles = roles
            .into_iter()
            .map(|(name, perms)| RoleDefinition::new(name, PermissionList::new(perms.iter().copied())))
            .collect();
        self
    }

    pub(crate) fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub(crate) fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl ConnectivityProbe for SimulatedPrimary {
    async fn probe(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.reachable.load(Ordering::SeqCst)
    }
}

impl IdentityRepository for SimulatedPrimary {
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<Identity>> {
        self.inner.find_by_email(email).await
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<Identity>> {
        self.inner.find_by_id(user_id).await
    }

    async fn create(&self, identity: &Identity) -> AuthResult<()> {
        self.inner.create(identity).await
    }

    async fn update_last_login(&self, user_id: &UserId, at: DateTime<Utc>) -> AuthResult<()> {
        self.inner.update_last_login(user_id, at).await
    }

    async fn update_password(&self, user_id: &UserId, password: &UserPassword) -> AuthResult<()> {
        self.inner.update_password(user_id, password).await
    }

    async fn set_role(&self, user_id: &UserId, role: UserRole) -> AuthResult<()> {
        self.inner.set_role(user_id, role).await
    }

    async fn set_active(&self, user_id: &UserId, active: bool) -> AuthResult<()> {
        self.inner.set_active(user_id, active).await
    }

    async fn set_reset_token(&self, user_id: &UserId, token: &OneTimeToken) -> AuthResult<()> {
        self.inner.set_reset_token(user_id, token).await
    }

    async fn find_by_reset_token(&self, digest: &str) -> AuthResult<Option<Identity>> {
        self.inner.find_by_reset_token(digest).await
    }

    async fn consume_reset_token(
        &self,
        user_id: &UserId,
        digest: &str,
        password: &UserPassword,
    ) -> AuthResult<bool> {
        self.inner.consume_reset_token(user_id, digest, password).await
    }

    async fn set_verification_token(
        &self,
        user_id: &UserId,
        token: &OneTimeToken,
    ) -> AuthResult<()> {
        self.inner.set_verification_token(user_id, token).await
    }

    async fn find_by_verification_token(&self, digest: &str) -> AuthResult<Option<Identity>> {
        self.inner.find_by_verification_token(digest).await
    }

    async fn consume_verification_token(
        &self,
        user_id: &UserId,
        digest: &str,
    ) -> AuthResult<bool> {
        self.inner.consume_verification_token(user_id, digest).await
    }

    async fn load_roles(&self) -> AuthResult<Vec<RoleDefinition>> {
        Ok(self.roles.clone())
    }
}

impl SessionRepository for SimulatedPrimary {
    async fn create_session(&self, session: &Session) -> AuthResult<()> {
        self.inner.create_session(session).await
    }

    async fn find_active_session(&self, token_digest: &str) -> AuthResult<Option<Session>> {
        self.inner.find_active_session(token_digest).await
    }

    async fn touch_session(&self, session_id: &SessionId) -> AuthResult<()> {
        self.inner.touch_session(session_id).await
    }

    async fn invalidate_session(&self, session_id: &SessionId) -> AuthResult<bool> {
        self.inner.invalidate_session(session_id).await
    }

    async fn invalidate_session_by_token(&self, token_digest: &str) -> AuthResult<bool> {
        self.inner.invalidate_session_by_token(token_digest).await
    }

    async fn invalidate_all_sessions(&self, user_id: &UserId) -> AuthResult<u64> {
        self.inner.invalidate_all_sessions(user_id).await
    }

    async fn list_active_sessions(&self, user_id: &UserId) -> AuthResult<Vec<Session>> {
        self.inner.list_active_sessions(user_id).await
    }

    async fn sweep_expired_sessions(&self) -> AuthResult<u64> {
        self.inner.sweep_expired_sessions().await
    }
}
