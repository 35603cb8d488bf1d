//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::token_service::TokenPair;
use crate::application::gateway::AuthOutput;
use crate::domain::entity::{identity::Identity, session::Session};
use crate::domain::value_object::user_id::{SessionId, UserId};

// ============================================================================
// Register / Login
// ============================================================================

/// Register request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default, alias = "rememberMe")]
    pub remember_me: bool,
}

/// Register and login response
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
    pub fallback_mode: bool,
}

impl From<AuthOutput> for AuthResponse {
    fn from(output: AuthOutput) -> Self {
        Self {
            user: UserResponse::from(&output.identity),
            tokens: output.tokens,
            fallback_mode: output.fallback_mode,
        }
    }
}

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    #[serde(alias = "refreshToken")]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokensResponse {
    pub tokens: TokenPair,
}

/// Logout body; optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoutAllResponse {
    pub sessions_invalidated: u64,
}

// ============================================================================
// Password / Verification
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(alias = "currentPassword")]
    pub current_password: String,
    #[serde(alias = "newPassword")]
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Users
// ============================================================================

/// Public view of an identity. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&Identity> for UserResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email.as_str().to_string(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            role: identity.role.code().to_string(),
            is_active: identity.is_active,
            email_verified: identity.is_email_verified(),
            last_login_at: identity.last_login_at,
            created_at: identity.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetRoleRequest {
    pub role: String,
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub id: SessionId,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// The session behind the caller's own access token
    pub current: bool,
}

impl SessionResponse {
    pub fn new(session: &Session, current: &SessionId) -> Self {
        Self {
            id: session.id,
            device_info: session.device_info.clone(),
            ip_address: session.ip_address.clone(),
            created_at: session.created_at,
            last_used_at: session.last_used_at,
            expires_at: session.expires_at,
            current: session.id == *current,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionResponse>,
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}
