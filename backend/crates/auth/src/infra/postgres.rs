//! PostgreSQL Repository Implementations

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::entity::{identity::Identity, one_time_token::OneTimeToken, session::Session};
use crate::domain::repository::{ConnectivityProbe, IdentityRepository, SessionRepository};
use crate::domain::value_object::{
    email::Email,
    permission::{PermissionList, RoleDefinition},
    user_id::{SessionId, UserId},
    user_password::UserPassword,
    user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};
use crate::infra::record::{IdentityRecord, SessionRecord};

const SELECT_IDENTITY: &str = r#"
    SELECT
        id,
        email,
        first_name,
        last_name,
        password_hash,
        role,
        is_active,
        email_verified_at,
        last_login_at,
        verification_token_hash,
        verification_token_expires_at,
        reset_token_hash,
        reset_token_expires_at,
        created_at,
        updated_at
    FROM users
"#;

const SELECT_SESSION: &str = r#"
    SELECT
        id,
        user_id,
        token_hash,
        device_info,
        ip_address,
        is_active,
        expires_at,
        created_at,
        last_used_at
    FROM user_sessions
"#;

/// PostgreSQL-backed identity and session store
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
    probe_timeout: Duration,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool, probe_timeout: Duration) -> Self {
        Self {
            pool,
            probe_timeout,
        }
    }

    /// Identity holding an unexpired one-time token. `column` is one of the
    /// two token-hash columns, never user input.
    async fn find_by_token(&self, column: &str, digest: &str) -> AuthResult<Option<Identity>> {
        let sql = format!(
            "{SELECT_IDENTITY} WHERE {column}_hash = $1 AND {column}_expires_at > $2"
        );
        let row = sqlx::query_as::<_, IdentityRecord>(&sql)
            .bind(digest)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        row.map(IdentityRecord::into_identity).transpose()
    }
}

fn require_updated(rows_affected: u64) -> AuthResult<()> {
    if rows_affected == 0 {
        return Err(AuthError::UserNotFound);
    }
    Ok(())
}

fn map_unique_violation(e: sqlx::Error) -> AuthError {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => AuthError::EmailTaken,
        other => other.into(),
    }
}

// ============================================================================
// Connectivity Probe
// ============================================================================

impl ConnectivityProbe for PgAuthRepository {
    async fn probe(&self) -> bool {
        let ping = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool);

        match tokio::time::timeout(self.probe_timeout, ping).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Relational store probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "Relational store probe timed out"
                );
                false
            }
        }
    }
}

// ============================================================================
// Identity Repository Implementation
// ============================================================================

impl IdentityRepository for PgAuthRepository {
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<Identity>> {
        let sql = format!("{SELECT_IDENTITY} WHERE lower(email) = lower($1)");
        let row = sqlx::query_as::<_, IdentityRecord>(&sql)
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(IdentityRecord::into_identity).transpose()
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRecord>(&format!("{SELECT_IDENTITY} WHERE id = $1"))
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(IdentityRecord::into_identity).transpose()
    }

    async fn create(&self, identity: &Identity) -> AuthResult<()> {
        let record = IdentityRecord::from(identity);

        sqlx::query(
            r#"
            INSERT INTO users (
                id,
                email,
                first_name,
                last_name,
                password_hash,
                role,
                is_active,
                email_verified_at,
                last_login_at,
                verification_token_hash,
                verification_token_expires_at,
                reset_token_hash,
                reset_token_expires_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(record.id)
        .bind(&record.email)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(&record.password_hash)
        .bind(&record.role)
        .bind(record.is_active)
        .bind(record.email_verified_at)
        .bind(record.last_login_at)
        .bind(&record.verification_token_hash)
        .bind(record.verification_token_expires_at)
        .bind(&record.reset_token_hash)
        .bind(record.reset_token_expires_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(())
    }

    async fn update_last_login(&self, user_id: &UserId, at: DateTime<Utc>) -> AuthResult<()> {
        let result = sqlx::query("UPDATE users SET last_login_at = $2, updated_at = $2 WHERE id = $1")
            .bind(user_id.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await?;

        require_updated(result.rows_affected())
    }

    async fn update_password(&self, user_id: &UserId, password: &UserPassword) -> AuthResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                password_hash = $2,
                reset_token_hash = NULL,
                reset_token_expires_at = NULL,
                updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(password.as_phc_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        require_updated(result.rows_affected())
    }

    async fn set_role(&self, user_id: &UserId, role: UserRole) -> AuthResult<()> {
        let result = sqlx::query("UPDATE users SET role = $2, updated_at = $3 WHERE id = $1")
            .bind(user_id.as_uuid())
            .bind(role.code())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        require_updated(result.rows_affected())
    }

    async fn set_active(&self, user_id: &UserId, active: bool) -> AuthResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = $2, updated_at = $3 WHERE id = $1")
            .bind(user_id.as_uuid())
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        require_updated(result.rows_affected())
    }

    async fn set_reset_token(&self, user_id: &UserId, token: &OneTimeToken) -> AuthResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                reset_token_hash = $2,
                reset_token_expires_at = $3,
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(&token.digest)
        .bind(token.expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        require_updated(result.rows_affected())
    }

    async fn find_by_reset_token(&self, digest: &str) -> AuthResult<Option<Identity>> {
        self.find_by_token("reset_token", digest).await
    }

    async fn consume_reset_token(
        &self,
        user_id: &UserId,
        digest: &str,
        password: &UserPassword,
    ) -> AuthResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE users SET
                password_hash = $3,
                reset_token_hash = NULL,
                reset_token_expires_at = NULL,
                updated_at = $4
            WHERE id = $1
              AND reset_token_hash = $2
              AND reset_token_expires_at > $4
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(digest)
        .bind(password.as_phc_string())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_verification_token(
        &self,
        user_id: &UserId,
        token: &OneTimeToken,
    ) -> AuthResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                verification_token_hash = $2,
                verification_token_expires_at = $3,
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(&token.digest)
        .bind(token.expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        require_updated(result.rows_affected())
    }

    async fn find_by_verification_token(&self, digest: &str) -> AuthResult<Option<Identity>> {
        self.find_by_token("verification_token", digest).await
    }

    async fn consume_verification_token(
        &self,
        user_id: &UserId,
        digest: &str,
    ) -> AuthResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE users SET
                email_verified_at = $3,
                verification_token_hash = NULL,
                verification_token_expires_at = NULL,
                updated_at = $3
            WHERE id = $1
              AND verification_token_hash = $2
              AND verification_token_expires_at > $3
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(digest)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn load_roles(&self) -> AuthResult<Vec<RoleDefinition>> {
        let rows = sqlx::query_as::<_, RoleRow>("SELECT name, permissions FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| RoleDefinition::new(r.name, PermissionList::parse(&r.permissions)))
            .collect())
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

impl SessionRepository for PgAuthRepository {
    async fn create_session(&self, session: &Session) -> AuthResult<()> {
        let record = SessionRecord::from(session);

        sqlx::query(
            r#"
            INSERT INTO user_sessions (
                id,
                user_id,
                token_hash,
                device_info,
                ip_address,
                is_active,
                expires_at,
                created_at,
                last_used_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.token_hash)
        .bind(&record.device_info)
        .bind(&record.ip_address)
        .bind(record.is_active)
        .bind(record.expires_at)
        .bind(record.created_at)
        .bind(record.last_used_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_active_session(&self, token_digest: &str) -> AuthResult<Option<Session>> {
        let sql = format!("{SELECT_SESSION} WHERE token_hash = $1 AND is_active AND expires_at > $2");
        let row = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(token_digest)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Session::from))
    }

    async fn touch_session(&self, session_id: &SessionId) -> AuthResult<()> {
        sqlx::query("UPDATE user_sessions SET last_used_at = $2 WHERE id = $1 AND is_active")
            .bind(session_id.as_uuid())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn invalidate_session(&self, session_id: &SessionId) -> AuthResult<bool> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_active = FALSE, last_used_at = $2 WHERE id = $1 AND is_active",
        )
        .bind(session_id.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn invalidate_session_by_token(&self, token_digest: &str) -> AuthResult<bool> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_active = FALSE, last_used_at = $2 WHERE token_hash = $1 AND is_active",
        )
        .bind(token_digest)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn invalidate_all_sessions(&self, user_id: &UserId) -> AuthResult<u64> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_active = FALSE, last_used_at = $2 WHERE user_id = $1 AND is_active",
        )
        .bind(user_id.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_active_sessions(&self, user_id: &UserId) -> AuthResult<Vec<Session>> {
        let sql = format!(
            "{SELECT_SESSION} WHERE user_id = $1 AND is_active AND expires_at > $2 ORDER BY last_used_at DESC"
        );
        let rows = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(user_id.as_uuid())
            .bind(Utc::now())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Session::from).collect())
    }

    async fn sweep_expired_sessions(&self) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM user_sessions WHERE NOT is_active OR expires_at <= $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct RoleRow {
    name: String,
    permissions: serde_json::Value,
}
