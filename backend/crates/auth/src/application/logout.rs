//! Logout Use Case
//!
//! Best effort. Nothing here can fail the request.

use crate::application::email::EmailSender;
use crate::application::gateway::AuthGateway;
use crate::application::token_service::TokenType;
use crate::domain::entity::session::Session;
use crate::domain::repository::SessionRepository;
use crate::infra::dual::PrimaryStore;

impl<P, E> AuthGateway<P, E>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    /// End the session named by the access token's `sid` (expired tokens
    /// accepted) and, if given, the session holding the refresh token.
    pub async fn logout(&self, access_token: Option<&str>, refresh_token: Option<&str>) {
        let sid = access_token.and_then(|token| {
            self.tokens
                .decode_allow_expired(token, TokenType::Access)
                .map_err(|e| tracing::debug!(error = %e, "Logout with unusable access token"))
                .ok()
                .map(|claims| claims.sid)
        });

        if sid.is_none() && refresh_token.is_none() {
            return;
        }

        let backend = self.store.select().await;

        if let Some(sid) = sid {
            match backend.invalidate_session(&sid).await {
                Ok(ended) => tracing::debug!(session_id = %sid, ended, "Logout"),
                Err(e) => tracing::warn!(error = %e, session_id = %sid, "Logout: failed to end session"),
            }
        }

        if let Some(token) = refresh_token {
            if let Err(e) = backend
                .invalidate_session_by_token(&Session::digest_of(token))
                .await
            {
                tracing::warn!(error = %e, "Logout: failed to end refresh session");
            }
        }
    }
}
