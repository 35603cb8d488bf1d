//! Refresh Use Case
//!
//! Rotates a refresh token: the old session ends and a new one starts.

use platform::client::ClientInfo;

use crate::application::email::EmailSender;
use crate::application::gateway::AuthGateway;
use crate::application::token_service::{TokenPair, TokenType};
use crate::domain::entity::session::Session;
use crate::domain::repository::{IdentityRepository, SessionRepository};
use crate::error::{AuthError, AuthResult};
use crate::infra::dual::PrimaryStore;

impl<P, E> AuthGateway<P, E>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    pub async fn refresh(&self, refresh_token: &str, client: &ClientInfo) -> AuthResult<TokenPair> {
        let claims = self.tokens.verify(refresh_token, TokenType::Refresh)?;

        let backend = self.store.select().await;

        let session = backend
            .find_active_session(&Session::digest_of(refresh_token))
            .await?
            .filter(|s| s.user_id == claims.user_id)
            .ok_or(AuthError::SessionInvalid)?;

        let identity = backend
            .find_by_id(&claims.user_id)
            .await?
            .ok_or(AuthError::SessionInvalid)?;
        if !identity.is_active {
            return Err(AuthError::AccountInactive);
        }

        // Losing this race means another request already rotated the token
        if !backend.invalidate_session(&session.id).await? {
            return Err(AuthError::SessionInvalid);
        }

        let tokens = self.open_session(&backend, &identity, client).await?;

        tracing::debug!(
            user_id = %identity.id,
            old_session_id = %session.id,
            fallback_mode = backend.is_fallback(),
            "Refresh token rotated"
        );

        Ok(tokens)
    }
}
