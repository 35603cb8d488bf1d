//! User Password Value Object
//!
//! Domain wrapper over `platform::password`. Hashing and verification are
//! CPU-bound Argon2id work, so the async entry points run them on Tokio's
//! blocking pool and keep the I/O workers free.

use platform::password::{ClearTextPassword, HashedPassword, PasswordPolicy};
use std::fmt;

use crate::error::{AuthError, AuthResult};

// ============================================================================
// Raw Password (User Input)
// ============================================================================

/// Raw password from user input. Zeroized on drop.
pub struct RawPassword(ClearTextPassword);

impl RawPassword {
    pub fn new(raw: String) -> Self {
        Self(ClearTextPassword::new(raw))
    }
}

impl fmt::Debug for RawPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawPassword").field(&"[REDACTED]").finish()
    }
}

// ============================================================================
// User Password (Hashed, for storage)
// ============================================================================

/// Hashed user password (Argon2id PHC string)
#[derive(Clone, PartialEq, Eq)]
pub struct UserPassword(HashedPassword);

impl UserPassword {
    /// Hash on the blocking pool.
    pub async fn hash(policy: PasswordPolicy, raw: RawPassword) -> AuthResult<Self> {
        let hashed = tokio::task::spawn_blocking(move || policy.hash(&raw.0))
            .await
            .map_err(|e| AuthError::Internal(format!("Hashing task failed: {}", e)))?
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(Self(hashed))
    }

    /// Verify on the blocking pool.
    pub async fn verify(&self, raw: RawPassword) -> AuthResult<bool> {
        let hashed = self.0.clone();
        tokio::task::spawn_blocking(move || hashed.verify(&raw.0))
            .await
            .map_err(|e| AuthError::Internal(format!("Verification task failed: {}", e)))
    }

    /// Create from PHC string (from storage)
    pub fn from_phc_string(phc_string: impl Into<String>) -> AuthResult<Self> {
        HashedPassword::from_phc_string(phc_string)
            .map(Self)
            .map_err(|_| AuthError::Internal("Invalid password hash in storage".into()))
    }

    pub fn as_phc_string(&self) -> &str {
        self.0.as_phc_string()
    }
}

impl fmt::Debug for UserPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
