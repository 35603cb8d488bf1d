//! Login Use Case
//!
//! Authenticates by email and password and opens a session.

use chrono::Utc;
use platform::client::ClientInfo;

use crate::application::email::EmailSender;
use crate::application::gateway::{AuthGateway, AuthOutput};
use crate::domain::repository::IdentityRepository;
use crate::domain::value_object::{email::Email, user_password::RawPassword};
use crate::error::{AuthError, AuthResult};
use crate::infra::dual::PrimaryStore;

/// Login input
pub struct LoginInput {
    pub email: String,
    pub password: String,
    /// Accepted for client compatibility; logged only
    pub remember_me: bool,
}

impl<P, E> AuthGateway<P, E>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    pub async fn login(&self, input: LoginInput, client: &ClientInfo) -> AuthResult<AuthOutput> {
        self.check_auth_rate(&format!("login:{}", Email::normalize(&input.email)))?;

        // Unknown, inactive and wrong password all look the same to the caller
        let email = Email::new(&input.email).map_err(|_| AuthError::InvalidCredentials)?;

        let backend = self.store.select().await;

        let mut identity = backend
            .find_by_email(&email)
            .await?
            .filter(|i| i.is_active)
            .ok_or(AuthError::InvalidCredentials)?;

        if !identity.password.verify(RawPassword::new(input.password)).await? {
            tracing::warn!(
                user_id = %identity.id,
                fallback_mode = backend.is_fallback(),
                "Login failed: wrong password"
            );
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.open_session(&backend, &identity, client).await?;

        let now = Utc::now();
        match backend.update_last_login(&identity.id, now).await {
            Ok(()) => identity.record_login(now),
            Err(e) => {
                tracing::warn!(error = %e, user_id = %identity.id, "Failed to record last login");
            }
        }

        tracing::info!(
            user_id = %identity.id,
            remember_me = input.remember_me,
            fallback_mode = backend.is_fallback(),
            "User logged in"
        );

        Ok(AuthOutput {
            identity,
            tokens,
            fallback_mode: backend.is_fallback(),
        })
    }
}
