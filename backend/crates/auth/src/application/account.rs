//! Account Use Cases
//!
//! Flows for an already authenticated caller, plus the admin-only account
//! management operations.

use crate::application::authorization::AuthenticatedUser;
use crate::application::email::EmailSender;
use crate::application::gateway::AuthGateway;
use crate::domain::entity::{identity::Identity, session::Session};
use crate::domain::repository::{IdentityRepository, SessionRepository};
use crate::domain::value_object::{
    user_id::UserId,
    user_password::{RawPassword, UserPassword},
    user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};
use crate::infra::dual::PrimaryStore;

/// Change password input
pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
}

impl<P, E> AuthGateway<P, E>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    pub async fn current_user(&self, user: &AuthenticatedUser) -> AuthResult<Identity> {
        let backend = self.store.select().await;

        let identity = backend
            .find_by_id(&user.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !identity.is_active {
            return Err(AuthError::AccountInactive);
        }

        if let Err(e) = backend.touch_session(&user.session_id).await {
            tracing::debug!(error = %e, session_id = %user.session_id, "Failed to touch session");
        }
        Ok(identity)
    }

    pub async fn change_password(
        &self,
        user: &AuthenticatedUser,
        input: ChangePasswordInput,
    ) -> AuthResult<()> {
        let backend = self.store.select().await;

        let identity = backend
            .find_by_id(&user.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !identity
            .password
            .verify(RawPassword::new(input.current_password))
            .await?
        {
            return Err(AuthError::IncorrectPassword);
        }

        self.ensure_strong(&input.new_password)?;
        let password = UserPassword::hash(self.policy, RawPassword::new(input.new_password)).await?;
        backend.update_password(&identity.id, &password).await?;

        self.end_all_sessions(&backend, &identity).await;
        self.notify_password_changed(&identity).await;

        tracing::info!(user_id = %identity.id, "Password changed");
        Ok(())
    }

    /// End every session of the caller. Returns how many were ended.
    pub async fn logout_all(&self, user: &AuthenticatedUser) -> AuthResult<u64> {
        let backend = self.store.select().await;
        let count = backend.invalidate_all_sessions(&user.user_id).await?;

        tracing::info!(user_id = %user.user_id, sessions = count, "Logged out everywhere");
        Ok(count)
    }

    pub async fn list_sessions(&self, user: &AuthenticatedUser) -> AuthResult<Vec<Session>> {
        let backend = self.store.select().await;
        backend.list_active_sessions(&user.user_id).await
    }

    /// Another account's profile. Only its owner or an admin may read it.
    pub async fn user_by_id(&self, user: &AuthenticatedUser, target: &UserId) -> AuthResult<Identity> {
        self.authz.authorize_ownership(user, target)?;

        let backend = self.store.select().await;
        backend.find_by_id(target).await?.ok_or(AuthError::UserNotFound)
    }

    // ========================================================================
    // Admin
    // ========================================================================

    pub async fn set_role(
        &self,
        admin: &AuthenticatedUser,
        target: &UserId,
        role: UserRole,
    ) -> AuthResult<Identity> {
        self.authz.authorize_role(admin, &[UserRole::Admin])?;

        let backend = self.store.select().await;
        backend.set_role(target, role).await?;
        let identity = backend
            .find_by_id(target)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(
            admin_id = %admin.user_id,
            user_id = %target,
            role = %role,
            "Role changed"
        );
        Ok(identity)
    }

    /// Soft-delete an account and end its sessions.
    pub async fn deactivate(&self, admin: &AuthenticatedUser, target: &UserId) -> AuthResult<()> {
        self.authz.authorize_role(admin, &[UserRole::Admin])?;
        if admin.user_id == *target {
            return Err(AuthError::Validation("Cannot deactivate your own account".into()));
        }

        let backend = self.store.select().await;
        backend.set_active(target, false).await?;

        match backend.invalidate_all_sessions(target).await {
            Ok(count) => tracing::info!(
                admin_id = %admin.user_id,
                user_id = %target,
                sessions = count,
                "Account deactivated"
            ),
            Err(e) => tracing::warn!(error = %e, user_id = %target, "Failed to end sessions of deactivated account"),
        }
        Ok(())
    }
}
