//! Password Reset Use Cases
//!
//! `forgot_password` answers the same way whether or not the address is
//! registered. `reset_password` consumes the token in the same write that
//! stores the new hash.

use crate::application::email::EmailSender;
use crate::application::gateway::AuthGateway;
use crate::domain::entity::one_time_token::OneTimeToken;
use crate::domain::repository::IdentityRepository;
use crate::domain::value_object::{
    email::Email,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};
use crate::infra::dual::PrimaryStore;

/// Returned for every well-formed forgot-password request
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for that email, a password reset link has been sent";

impl<P, E> AuthGateway<P, E>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    pub async fn forgot_password(&self, email: &str) -> AuthResult<&'static str> {
        self.check_auth_rate(&format!("forgot:{}", Email::normalize(email)))?;
        let email = Email::new(email)?;

        let backend = self.store.select().await;

        let Some(identity) = backend.find_by_email(&email).await?.filter(|i| i.is_active) else {
            tracing::debug!(email_domain = email.domain(), "Password reset for unknown or inactive account");
            return Ok(FORGOT_PASSWORD_MESSAGE);
        };

        let ttl = chrono::Duration::seconds(self.config.reset_ttl.as_secs() as i64);
        let (raw, token) = OneTimeToken::issue(ttl);
        backend.set_reset_token(&identity.id, &token).await?;

        if let Err(e) = self
            .email
            .send_password_reset_email(&identity.email, &identity.display_name(), &raw)
            .await
        {
            tracing::warn!(error = %e, user_id = %identity.id, "Failed to send password reset email");
        }

        tracing::info!(
            user_id = %identity.id,
            fallback_mode = backend.is_fallback(),
            "Password reset requested"
        );
        Ok(FORGOT_PASSWORD_MESSAGE)
    }

    pub async fn reset_password(&self, token: &str, new_password: String) -> AuthResult<()> {
        let digest = OneTimeToken::digest_of(token.trim());

        let backend = self.store.select().await;

        let identity = backend
            .find_by_reset_token(&digest)
            .await?
            .ok_or(AuthError::ResetTokenInvalid)?;

        self.ensure_strong(&new_password)?;
        let password = UserPassword::hash(self.policy, RawPassword::new(new_password)).await?;

        if !backend
            .consume_reset_token(&identity.id, &digest, &password)
            .await?
        {
            return Err(AuthError::ResetTokenInvalid);
        }

        self.end_all_sessions(&backend, &identity).await;
        self.notify_password_changed(&identity).await;

        tracing::info!(
            user_id = %identity.id,
            fallback_mode = backend.is_fallback(),
            "Password reset completed"
        );
        Ok(())
    }
}
