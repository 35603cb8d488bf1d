//! Storage records
//!
//! Flat mirrors of the relational schema. The same structs are SQL rows
//! (`FromRow`) and fallback-file entries (serde), so both backends persist
//! identical shapes. These are the only types that carry a password hash
//! into serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entity::{identity::Identity, one_time_token::OneTimeToken, session::Session};
use crate::domain::value_object::{
    email::Email,
    user_id::{SessionId, UserId},
    user_password::UserPassword,
    user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub(crate) struct IdentityRecord {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub verification_token_hash: Option<String>,
    #[serde(default)]
    pub verification_token_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reset_token_hash: Option<String>,
    #[serde(default)]
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn split_token(token: &Option<OneTimeToken>) -> (Option<String>, Option<DateTime<Utc>>) {
    match token {
        Some(t) => (Some(t.digest.clone()), Some(t.expires_at)),
        None => (None, None),
    }
}

fn join_token(digest: Option<String>, expires_at: Option<DateTime<Utc>>) -> Option<OneTimeToken> {
    match (digest, expires_at) {
        (Some(digest), Some(expires_at)) => Some(OneTimeToken { digest, expires_at }),
        _ => None,
    }
}

impl From<&Identity> for IdentityRecord {
    fn from(identity: &Identity) -> Self {
        let (verification_token_hash, verification_token_expires_at) =
            split_token(&identity.verification_token);
        let (reset_token_hash, reset_token_expires_at) = split_token(&identity.reset_token);

        Self {
            id: *identity.id.as_uuid(),
            email: identity.email.as_str().to_string(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            password_hash: identity.password.as_phc_string().to_string(),
            role: identity.role.code().to_string(),
            is_active: identity.is_active,
            email_verified_at: identity.email_verified_at,
            last_login_at: identity.last_login_at,
            verification_token_hash,
            verification_token_expires_at,
            reset_token_hash,
            reset_token_expires_at,
            created_at: identity.created_at,
            updated_at: identity.updated_at,
        }
    }
}

impl IdentityRecord {
    pub fn into_identity(self) -> AuthResult<Identity> {
        let role = UserRole::from_code(&self.role).ok_or_else(|| {
            AuthError::Internal(format!("Unknown role '{}' on user {}", self.role, self.id))
        })?;

        Ok(Identity {
            id: UserId::from_uuid(self.id),
            email: Email::from_db(self.email),
            first_name: self.first_name,
            last_name: self.last_name,
            password: UserPassword::from_phc_string(self.password_hash)?,
            role,
            is_active: self.is_active,
            email_verified_at: self.email_verified_at,
            last_login_at: self.last_login_at,
            verification_token: join_token(
                self.verification_token_hash,
                self.verification_token_expires_at,
            ),
            reset_token: join_token(self.reset_token_hash, self.reset_token_expires_at),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub(crate) struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl From<&Session> for SessionRecord {
    fn from(session: &Session) -> Self {
        Self {
            id: *session.id.as_uuid(),
            user_id: *session.user_id.as_uuid(),
            token_hash: session.token_digest.clone(),
            device_info: session.device_info.clone(),
            ip_address: session.ip_address.clone(),
            is_active: session.is_active,
            expires_at: session.expires_at,
            created_at: session.created_at,
            last_used_at: session.last_used_at,
        }
    }
}

impl From<SessionRecord> for Session {
    fn from(record: SessionRecord) -> Self {
        Self {
            id: SessionId::from_uuid(record.id),
            user_id: UserId::from_uuid(record.user_id),
            token_digest: record.token_hash,
            device_info: record.device_info,
            ip_address: record.ip_address,
            is_active: record.is_active,
            expires_at: record.expires_at,
            created_at: record.created_at,
            last_used_at: record.last_used_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::identity::tests::identity;
    use chrono::Duration;

    #[tokio::test]
    async fn test_identity_record_preserves_tokens() {
        let mut original = identity("ada@example.com", "Str0ng!1").await;
        let (_, token) = OneTimeToken::issue(Duration::hours(1));
        original.reset_token = Some(token.clone());

        let record = IdentityRecord::from(&original);
        assert_eq!(record.role, "student");
        assert!(record.verification_token_hash.is_none());

        let restored = record.into_identity().unwrap();
        assert_eq!(restored.id, original.id);
        assert_eq!(restored.reset_token, Some(token));
        assert!(restored.verification_token.is_none());
    }

    #[tokio::test]
    async fn test_unknown_role_is_rejected() {
        let mut record = IdentityRecord::from(&identity("ada@example.com", "Str0ng!1").await);
        record.role = "wizard".into();
        assert!(matches!(record.into_identity(), Err(AuthError::Internal(_))));
    }
}
