//! JSON-file fallback store
//!
//! Serves identities and sessions while the relational store is unreachable.
//! Each collection is one JSON array document on local disk. Every write is a
//! whole-document read-modify-write under a per-document async mutex, then a
//! temp-file write and rename. Single process only.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::fs as tokio_fs;
use tokio::sync::Mutex;

use crate::domain::entity::{identity::Identity, one_time_token::OneTimeToken, session::Session};
use crate::domain::repository::{IdentityRepository, SessionRepository};
use crate::domain::value_object::{
    email::Email,
    permission::RoleDefinition,
    user_id::{SessionId, UserId},
    user_password::UserPassword,
    user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};
use crate::infra::record::{IdentityRecord, SessionRecord};

// ============================================================================
// JSON array document
// ============================================================================

struct JsonDocument<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned,
{
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    /// Missing or empty file reads as an empty collection.
    async fn load(&self) -> AuthResult<Vec<T>> {
        let bytes = match tokio_fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn store(&self, items: &[T]) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio_fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(items)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn read(&self) -> AuthResult<Vec<T>> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// Run `f` over the whole collection under the document lock. The file is
    /// rewritten only when `f` reports a change.
    async fn modify<R>(
        &self,
        f: impl FnOnce(&mut Vec<T>) -> AuthResult<(R, bool)>,
    ) -> AuthResult<R> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;
        let (result, changed) = f(&mut items)?;
        if changed {
            self.store(&items).await?;
        }
        Ok(result)
    }
}

// ============================================================================
// Store
// ============================================================================

/// Local durable fallback for identities and sessions
pub struct FileAuthStore {
    users: JsonDocument<IdentityRecord>,
    sessions: JsonDocument<SessionRecord>,
}

impl FileAuthStore {
    pub fn new(users_path: impl Into<PathBuf>, sessions_path: impl Into<PathBuf>) -> Self {
        Self {
            users: JsonDocument::new(users_path.into()),
            sessions: JsonDocument::new(sessions_path.into()),
        }
    }

    /// Both documents under one directory, with default file names
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(
            dir.join("fallback_users.json"),
            dir.join("fallback_sessions.json"),
        )
    }

    pub fn users_path(&self) -> &Path {
        &self.users.path
    }

    async fn find_identity(
        &self,
        pred: impl Fn(&IdentityRecord) -> bool,
    ) -> AuthResult<Option<Identity>> {
        self.users
            .read()
            .await?
            .into_iter()
            .find(|r| pred(r))
            .map(IdentityRecord::into_identity)
            .transpose()
    }

    /// Load, mutate and write back one identity. `f` returns whether it
    /// changed anything. `Ok(None)` when there is no such identity.
    async fn update_identity<R>(
        &self,
        user_id: &UserId,
        f: impl FnOnce(&mut Identity) -> R,
        changed: impl FnOnce(&R) -> bool,
    ) -> AuthResult<Option<R>> {
        let id = *user_id.as_uuid();
        self.users
            .modify(|records| {
                let Some(slot) = records.iter_mut().find(|r| r.id == id) else {
                    return Ok((None, false));
                };
                let mut identity = slot.clone().into_identity()?;
                let result = f(&mut identity);
                let dirty = changed(&result);
                if dirty {
                    *slot = IdentityRecord::from(&identity);
                }
                Ok((Some(result), dirty))
            })
            .await
    }

    async fn update_existing(
        &self,
        user_id: &UserId,
        f: impl FnOnce(&mut Identity),
    ) -> AuthResult<()> {
        self.update_identity(user_id, f, |_| true)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn update_sessions(
        &self,
        pred: impl Fn(&SessionRecord) -> bool,
        now: DateTime<Utc>,
    ) -> AuthResult<u64> {
        self.sessions
            .modify(|records| {
                let mut flipped = 0u64;
                for record in records.iter_mut() {
                    if record.is_active && pred(record) {
                        record.is_active = false;
                        record.last_used_at = now;
                        flipped += 1;
                    }
                }
                Ok((flipped, flipped > 0))
            })
            .await
    }
}

// ============================================================================
// Identity Repository Implementation
// ============================================================================

impl IdentityRepository for FileAuthStore {
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<Identity>> {
        self.find_identity(|r| r.email.eq_ignore_ascii_case(email.as_str()))
            .await
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<Identity>> {
        let id = *user_id.as_uuid();
        self.find_identity(|r| r.id == id).await
    }

    async fn create(&self, identity: &Identity) -> AuthResult<()> {
        let record = IdentityRecord::from(identity);
        self.users
            .modify(|records| {
                if records
                    .iter()
                    .any(|r| r.email.eq_ignore_ascii_case(&record.email))
                {
                    return Err(AuthError::EmailTaken);
                }
                records.push(record);
                Ok(((), true))
            })
            .await
    }

    async fn update_last_login(&self, user_id: &UserId, at: DateTime<Utc>) -> AuthResult<()> {
        self.update_existing(user_id, |identity| identity.record_login(at))
            .await
    }

    async fn update_password(&self, user_id: &UserId, password: &UserPassword) -> AuthResult<()> {
        let password = password.clone();
        self.update_existing(user_id, move |identity| identity.set_password(password))
            .await
    }

    async fn set_role(&self, user_id: &UserId, role: UserRole) -> AuthResult<()> {
        self.update_existing(user_id, |identity| identity.set_role(role))
            .await
    }

    async fn set_active(&self, user_id: &UserId, active: bool) -> AuthResult<()> {
        self.update_existing(user_id, |identity| identity.set_active(active))
            .await
    }

    async fn set_reset_token(&self, user_id: &UserId, token: &OneTimeToken) -> AuthResult<()> {
        let token = token.clone();
        self.update_existing(user_id, move |identity| {
            identity.reset_token = Some(token);
            identity.updated_at = Utc::now();
        })
        .await
    }

    async fn find_by_reset_token(&self, digest: &str) -> AuthResult<Option<Identity>> {
        let now = Utc::now();
        self.find_identity(|r| {
            r.reset_token_hash.as_deref() == Some(digest)
                && r.reset_token_expires_at.is_some_and(|exp| now < exp)
        })
        .await
    }

    async fn consume_reset_token(
        &self,
        user_id: &UserId,
        digest: &str,
        password: &UserPassword,
    ) -> AuthResult<bool> {
        let password = password.clone();
        let consumed = self
            .update_identity(
                user_id,
                |identity| identity.consume_reset_token(digest, password, Utc::now()),
                |consumed| *consumed,
            )
            .await?;
        Ok(consumed.unwrap_or(false))
    }

    async fn set_verification_token(
        &self,
        user_id: &UserId,
        token: &OneTimeToken,
    ) -> AuthResult<()> {
        let token = token.clone();
        self.update_existing(user_id, move |identity| {
            identity.verification_token = Some(token);
            identity.updated_at = Utc::now();
        })
        .await
    }

    async fn find_by_verification_token(&self, digest: &str) -> AuthResult<Option<Identity>> {
        let now = Utc::now();
        self.find_identity(|r| {
            r.verification_token_hash.as_deref() == Some(digest)
                && r.verification_token_expires_at.is_some_and(|exp| now < exp)
        })
        .await
    }

    async fn consume_verification_token(
        &self,
        user_id: &UserId,
        digest: &str,
    ) -> AuthResult<bool> {
        let consumed = self
            .update_identity(
                user_id,
                |identity| identity.consume_verification_token(digest, Utc::now()),
                |consumed| *consumed,
            )
            .await?;
        Ok(consumed.unwrap_or(false))
    }

    /// The file store carries no role table; the built-in one applies.
    async fn load_roles(&self) -> AuthResult<Vec<RoleDefinition>> {
        Ok(Vec::new())
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

impl SessionRepository for FileAuthStore {
    async fn create_session(&self, session: &Session) -> AuthResult<()> {
        let record = SessionRecord::from(session);
        self.sessions
            .modify(|records| {
                records.push(record);
                Ok(((), true))
            })
            .await
    }

    async fn find_active_session(&self, token_digest: &str) -> AuthResult<Option<Session>> {
        let now = Utc::now();
        Ok(self
            .sessions
            .read()
            .await?
            .into_iter()
            .map(Session::from)
            .find(|s| s.token_digest == token_digest && s.is_usable_at(now)))
    }

    async fn touch_session(&self, session_id: &SessionId) -> AuthResult<()> {
        let id = *session_id.as_uuid();
        let now = Utc::now();
        self.sessions
            .modify(|records| {
                let mut touched = false;
                if let Some(record) = records.iter_mut().find(|r| r.id == id && r.is_active) {
                    record.last_used_at = now;
                    touched = true;
                }
                Ok(((), touched))
            })
            .await
    }

    async fn invalidate_session(&self, session_id: &SessionId) -> AuthResult<bool> {
        let id = *session_id.as_uuid();
        Ok(self.update_sessions(|r| r.id == id, Utc::now()).await? > 0)
    }

    async fn invalidate_session_by_token(&self, token_digest: &str) -> AuthResult<bool> {
        Ok(self
            .update_sessions(|r| r.token_hash == token_digest, Utc::now())
            .await?
            > 0)
    }

    async fn invalidate_all_sessions(&self, user_id: &UserId) -> AuthResult<u64> {
        let id = *user_id.as_uuid();
        self.update_sessions(|r| r.user_id == id, Utc::now()).await
    }

    async fn list_active_sessions(&self, user_id: &UserId) -> AuthResult<Vec<Session>> {
        let id = *user_id.as_uuid();
        let now = Utc::now();
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .await?
            .into_iter()
            .filter(|r| r.user_id == id)
            .map(Session::from)
            .filter(|s| s.is_usable_at(now))
            .collect();
        sessions.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
        Ok(sessions)
    }

    async fn sweep_expired_sessions(&self) -> AuthResult<u64> {
        let now = Utc::now();
        self.sessions
            .modify(|records| {
                let before = records.len();
                records.retain(|r| !Session::from(r.clone()).is_sweepable_at(now));
                let removed = (before - records.len()) as u64;
                Ok((removed, removed > 0))
            })
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================
