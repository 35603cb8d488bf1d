//! Email Verification Use Cases

use crate::application::authorization::AuthenticatedUser;
use crate::application::email::EmailSender;
use crate::application::gateway::AuthGateway;
use crate::domain::entity::one_time_token::OneTimeToken;
use crate::domain::repository::IdentityRepository;
use crate::error::{AuthError, AuthResult};
use crate::infra::dual::PrimaryStore;

impl<P, E> AuthGateway<P, E>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    pub async fn verify_email(&self, token: &str) -> AuthResult<()> {
        let digest = OneTimeToken::digest_of(token.trim());

        let backend = self.store.select().await;

        let identity = backend
            .find_by_verification_token(&digest)
            .await?
            .ok_or(AuthError::VerificationTokenInvalid)?;

        if !backend
            .consume_verification_token(&identity.id, &digest)
            .await?
        {
            return Err(AuthError::VerificationTokenInvalid);
        }

        tracing::info!(user_id = %identity.id, "Email verified");
        Ok(())
    }

    pub async fn resend_verification(&self, user: &AuthenticatedUser) -> AuthResult<()> {
        let backend = self.store.select().await;

        let identity = backend
            .find_by_id(&user.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if identity.is_email_verified() {
            return Err(AuthError::Validation("Email is already verified".into()));
        }

        self.send_verification(&backend, &identity).await;
        Ok(())
    }
}
