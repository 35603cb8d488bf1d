//! Auth Gateway
//!
//! Owns every collaborator the account flows need and holds the helpers the
//! flows share. The flows themselves live one per module next to this one,
//! each as an `impl AuthGateway` block.
//!
//! Every flow calls `DualModeStore::select` exactly once and routes all its
//! storage calls through the returned backend.

use std::sync::Arc;

use platform::client::ClientInfo;
use platform::password::PasswordPolicy;
use platform::rate_limit::InMemoryRateLimiter;

use crate::application::authorization::{AuthenticatedUser, AuthorizationEngine};
use crate::application::config::AuthConfig;
use crate::application::email::EmailSender;
use crate::application::token_service::{TokenPair, TokenService, TokenType};
use crate::domain::entity::{identity::Identity, one_time_token::OneTimeToken, session::Session};
use crate::domain::repository::{IdentityRepository, SessionRepository};
use crate::domain::value_object::user_id::SessionId;
use crate::infra::dual::{Backend, DualModeStore, PrimaryStore};
use crate::error::{AuthError, AuthResult};

/// Result of a flow that signs the caller in
#[derive(Debug, Clone)]
pub struct AuthOutput {
    pub identity: Identity,
    pub tokens: TokenPair,
    /// Served from the fallback files
    pub fallback_mode: bool,
}

pub struct AuthGateway<P, E> {
    pub(crate) store: Arc<DualModeStore<P>>,
    pub(crate) tokens: TokenService,
    pub(crate) policy: PasswordPolicy,
    pub(crate) auth_limiter: InMemoryRateLimiter,
    pub(crate) user_limiter: InMemoryRateLimiter,
    pub(crate) email: E,
    pub(crate) authz: AuthorizationEngine,
    pub(crate) config: AuthConfig,
}

impl<P, E> AuthGateway<P, E>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    pub fn new(
        store: Arc<DualModeStore<P>>,
        email: E,
        authz: AuthorizationEngine,
        config: AuthConfig,
    ) -> Self {
        Self {
            store,
            tokens: TokenService::new(&config),
            policy: config.password_policy(),
            auth_limiter: InMemoryRateLimiter::new(),
            user_limiter: InMemoryRateLimiter::new(),
            email,
            authz,
            config,
        }
    }

    pub fn store(&self) -> &DualModeStore<P> {
        &self.store
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn authz(&self) -> &AuthorizationEngine {
        &self.authz
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    // ========================================================================
    // Shared helpers
    // ========================================================================

    /// Per-email throttle for credential endpoints.
    pub(crate) fn check_auth_rate(&self, key: &str) -> AuthResult<()> {
        let result = self.auth_limiter.check(key, &self.config.auth_rate_limit);
        if !result.allowed {
            tracing::warn!(retry_after_secs = result.retry_after_secs(), "Auth rate limit exceeded");
            return Err(AuthError::RateLimited {
                retry_after_secs: result.retry_after_secs(),
            });
        }
        Ok(())
    }

    /// Per-user (or per-IP) throttle for protected routes.
    pub fn check_user_rate(&self, key: &str) -> AuthResult<()> {
        let result = self.user_limiter.check(key, &self.config.user_rate_limit);
        if !result.allowed {
            return Err(AuthError::RateLimited {
                retry_after_secs: result.retry_after_secs(),
            });
        }
        Ok(())
    }

    pub(crate) fn ensure_strong(&self, password: &str) -> AuthResult<()> {
        let strength = self.policy.validate_strength(password);
        if !strength.is_valid {
            return Err(AuthError::WeakPassword(strength.messages()));
        }
        Ok(())
    }

    /// Sign a token pair for a fresh session id, then record the session.
    /// The pair is returned even if recording fails.
    pub(crate) async fn open_session(
        &self,
        backend: &Backend<'_, P>,
        identity: &Identity,
        client: &ClientInfo,
    ) -> AuthResult<TokenPair> {
        let sid = SessionId::new();
        let tokens = self.tokens.issue_pair(identity, sid)?;

        let session = Session::new(
            sid,
            identity.id,
            &tokens.refresh_token,
            client,
            chrono::Duration::seconds(self.config.refresh_token_ttl_secs()),
        );
        if let Err(e) = backend.create_session(&session).await {
            tracing::warn!(
                error = %e,
                user_id = %identity.id,
                session_id = %sid,
                fallback_mode = backend.is_fallback(),
                "Failed to record session"
            );
        }

        Ok(tokens)
    }

    /// Store a fresh verification token and mail it. Best effort.
    pub(crate) async fn send_verification(&self, backend: &Backend<'_, P>, identity: &Identity) {
        let ttl = chrono::Duration::seconds(self.config.verification_ttl.as_secs() as i64);
        let (raw, token) = OneTimeToken::issue(ttl);

        if let Err(e) = backend.set_verification_token(&identity.id, &token).await {
            tracing::warn!(error = %e, user_id = %identity.id, "Failed to store verification token");
            return;
        }
        if let Err(e) = self
            .email
            .send_verification_email(&identity.email, &identity.display_name(), &raw)
            .await
        {
            tracing::warn!(error = %e, user_id = %identity.id, "Failed to send verification email");
        }
    }

    /// End every session of a user. Best effort.
    pub(crate) async fn end_all_sessions(&self, backend: &Backend<'_, P>, identity: &Identity) {
        match backend.invalidate_all_sessions(&identity.id).await {
            Ok(count) => {
                tracing::info!(user_id = %identity.id, sessions = count, "Sessions invalidated");
            }
            Err(e) => {
                tracing::warn!(error = %e, user_id = %identity.id, "Failed to invalidate sessions");
            }
        }
    }

    pub(crate) async fn notify_password_changed(&self, identity: &Identity) {
        if let Err(e) = self
            .email
            .send_password_changed_email(&identity.email, &identity.display_name())
            .await
        {
            tracing::warn!(error = %e, user_id = %identity.id, "Failed to send password-changed email");
        }
    }

    // ========================================================================
    // Request authentication
    // ========================================================================

    /// Resolve a Bearer access token to the caller. The role comes from the
    /// stored identity, not the token, so a role change applies at once.
    pub async fn authenticate(&self, access_token: &str) -> AuthResult<AuthenticatedUser> {
        let claims = self.tokens.verify(access_token, TokenType::Access)?;

        let backend = self.store.select().await;
        let identity = backend
            .find_by_id(&claims.user_id)
            .await?
            .ok_or(AuthError::TokenInvalid)?;

        if !identity.is_active {
            return Err(AuthError::AccountInactive);
        }

        Ok(AuthenticatedUser {
            user_id: identity.id,
            email: identity.email.as_str().to_string(),
            role: identity.role,
            session_id: claims.sid,
        })
    }
}
