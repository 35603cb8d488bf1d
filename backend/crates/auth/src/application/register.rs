//! Register Use Case
//!
//! Creates an active, unverified account and signs it in.

use platform::client::ClientInfo;

use crate::application::email::EmailSender;
use crate::application::gateway::{AuthGateway, AuthOutput};
use crate::domain::entity::identity::Identity;
use crate::domain::repository::IdentityRepository;
use crate::domain::value_object::{
    email::Email,
    user_password::{RawPassword, UserPassword},
    user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};
use crate::infra::dual::PrimaryStore;

const NAME_MAX_LENGTH: usize = 100;

/// Register input
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Defaults to student
    pub role: Option<String>,
}

fn validate_name(field: &str, raw: &str) -> AuthResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AuthError::Validation(format!("{} is required", field)));
    }
    if name.chars().count() > NAME_MAX_LENGTH {
        return Err(AuthError::Validation(format!(
            "{} must be at most {} characters",
            field, NAME_MAX_LENGTH
        )));
    }
    Ok(name.to_string())
}

fn requested_role(raw: Option<&str>) -> AuthResult<UserRole> {
    let role = match raw.map(str::trim).filter(|r| !r.is_empty()) {
        Some(code) => code.parse::<UserRole>()?,
        None => UserRole::default(),
    };
    if !role.is_self_assignable() {
        return Err(AuthError::Validation(format!(
            "Role '{}' cannot be self-assigned",
            role
        )));
    }
    Ok(role)
}

impl<P, E> AuthGateway<P, E>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    pub async fn register(&self, input: RegisterInput, client: &ClientInfo) -> AuthResult<AuthOutput> {
        let email = Email::new(&input.email)?;
        let first_name = validate_name("First name", &input.first_name)?;
        let last_name = validate_name("Last name", &input.last_name)?;
        let role = requested_role(input.role.as_deref())?;
        self.ensure_strong(&input.password)?;

        let backend = self.store.select().await;

        if backend.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password = UserPassword::hash(self.policy, RawPassword::new(input.password)).await?;
        let identity = Identity::new(email, first_name, last_name, password, role);
        backend.create(&identity).await?;

        let tokens = self.open_session(&backend, &identity, client).await?;
        self.send_verification(&backend, &identity).await;

        tracing::info!(
            user_id = %identity.id,
            role = %identity.role,
            email_domain = identity.email.domain(),
            fallback_mode = backend.is_fallback(),
            "User registered"
        );

        Ok(AuthOutput {
            identity,
            tokens,
            fallback_mode: backend.is_fallback(),
        })
    }
}
