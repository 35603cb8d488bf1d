//! Identity Entity
//!
//! A user account. Deliberately not `Serialize`: the password hash never
//! leaves through this type. Storage backends map it to their own records
//! and HTTP responses use `presentation::dto::UserResponse`.

use chrono::{DateTime, Utc};

use crate::domain::entity::one_time_token::OneTimeToken;
use crate::domain::value_object::{
    email::Email, user_id::UserId, user_password::UserPassword, user_role::UserRole,
};

#[derive(Debug, Clone)]
pub struct Identity {
    pub id: UserId,
    /// Unique per backend, stored lowercase
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub password: UserPassword,
    pub role: UserRole,
    /// Soft-delete flag
    pub is_active: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub verification_token: Option<OneTimeToken>,
    pub reset_token: Option<OneTimeToken>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// New active, unverified identity
    pub fn new(
        email: Email,
        first_name: String,
        last_name: String,
        password: UserPassword,
        role: UserRole,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: UserId::new(),
            email,
            first_name,
            last_name,
            password,
            role,
            is_active: true,
            email_verified_at: None,
            last_login_at: None,
            verification_token: None,
            reset_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }

    /// Record successful login
    pub fn record_login(&mut self, at: DateTime<Utc>) {
        self.last_login_at = Some(at);
        self.updated_at = at;
    }

    pub fn set_role(&mut self, role: UserRole) {
        self.role = role;
        self.updated_at = Utc::now();
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.updated_at = Utc::now();
    }

    /// Replace the password. Any outstanding reset token dies with the old
    /// password.
    pub fn set_password(&mut self, password: UserPassword) {
        self.password = password;
        self.reset_token = None;
        self.updated_at = Utc::now();
    }

    /// Apply a reset token: new password and the token consumed in one step.
    /// Returns `false` (and changes nothing) if the token is not usable.
    pub fn consume_reset_token(
        &mut self,
        digest: &str,
        password: UserPassword,
        now: DateTime<Utc>,
    ) -> bool {
        match &self.reset_token {
            Some(token) if token.accepts(digest, now) => {
                self.set_password(password);
                true
            }
            _ => false,
        }
    }

    /// Apply a verification token. Returns `false` if not usable.
    pub fn consume_verification_token(&mut self, digest: &str, now: DateTime<Utc>) -> bool {
        match &self.verification_token {
            Some(token) if token.accepts(digest, now) => {
                self.email_verified_at = Some(now);
                self.verification_token = None;
                self.updated_at = now;
                true
            }
            _ => false,
        }
    }
}
