//! Password Hashing, Verification and Strength Policy
//!
//! - Argon2id hashing (memory-hard), PHC string output
//! - Verification through Argon2's own routine (constant-time)
//! - Zeroization of plaintext on drop
//! - Strength rules that report every violation at once
//!
//! ## Cost
//! Deployments configure cost the way bcrypt-era services do, as a number of
//! "rounds" (`BCRYPT_ROUNDS`, default 12). Rounds map onto Argon2id's time
//! cost as `t = max(1, rounds - 10)` with m=19 MiB and p=1, so the default
//! lands on the OWASP baseline (m=19456, t=2, p=1).

use std::fmt;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::rngs::OsRng;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Constants
// ============================================================================

/// Default minimum password length
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (NIST: SHOULD permit at least 64)
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Default bcrypt-equivalent cost
pub const DEFAULT_ROUNDS: u32 = 12;

/// Argon2id memory cost in KiB (OWASP)
const ARGON2_MEMORY_KIB: u32 = 19_456;

// ============================================================================
// Error Types
// ============================================================================

/// A single violated strength rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordRule {
    #[error("Password must be at least {min} characters long")]
    TooShort { min: usize },

    #[error("Password must be at most {max} characters long")]
    TooLong { max: usize },

    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,

    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,

    #[error("Password must contain at least one number")]
    MissingDigit,

    #[error("Password must contain at least one special character")]
    MissingSpecial,
}

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordHashError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,

    #[error("Invalid cost parameters: {0}")]
    InvalidParams(String),
}

// ============================================================================
// Strength
// ============================================================================

/// Outcome of [`PasswordPolicy::validate_strength`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordStrength {
    pub is_valid: bool,
    /// Every violated rule, in a fixed order: length, lowercase, uppercase,
    /// digit, special.
    pub errors: Vec<PasswordRule>,
}

impl PasswordStrength {
    /// Human-readable messages, one per violated rule.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

// ============================================================================
// Clear Text Password (Zeroized on drop)
// ============================================================================

/// Clear text password with automatic memory zeroization
///
/// - NFKC-normalized on construction
/// - Not `Clone`
/// - Debug output is redacted
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextPassword(String);

impl ClearTextPassword {
    pub fn new(mut raw: String) -> Self {
        let normalized: String = raw.nfkc().collect();
        raw.zeroize();
        Self(normalized)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for ClearTextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClearTextPassword")
            .field(&"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Hashed Password (Safe to store)
// ============================================================================

/// Argon2id hash in PHC string format.
///
/// The PHC string carries algorithm, version, parameters and salt, so a hash
/// produced under an older cost setting still verifies.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword {
    hash: String,
}

impl HashedPassword {
    /// Create from PHC string (e.g., from a stored record)
    pub fn from_phc_string(s: impl Into<String>) -> Result<Self, PasswordHashError> {
        let hash = s.into();
        PasswordHash::new(&hash).map_err(|_| PasswordHashError::InvalidHashFormat)?;
        Ok(Self { hash })
    }

    pub fn as_phc_string(&self) -> &str {
        &self.hash
    }

    /// Verify a password against this hash. Parameters come from the PHC
    /// string, not from the current policy.
    pub fn verify(&self, password: &ClearTextPassword) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(&self.hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

// ============================================================================
// Policy
// ============================================================================

/// Strength rules plus hashing cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    min_length: usize,
    rounds: u32,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_PASSWORD_LENGTH,
            rounds: DEFAULT_ROUNDS,
        }
    }
}

impl PasswordPolicy {
    pub fn new(min_length: usize, rounds: u32) -> Self {
        Self { min_length, rounds }
    }

    /// Argon2id time cost derived from the configured rounds.
    pub fn time_cost(&self) -> u32 {
        self.rounds.saturating_sub(10).max(1)
    }

    /// Check every rule and collect all violations.
    pub fn validate_strength(&self, password: &str) -> PasswordStrength {
        let normalized: String = password.nfkc().collect();
        let length = normalized.chars().count();
        let mut errors = Vec::new();

        if length < self.min_length {
            errors.push(PasswordRule::TooShort {
                min: self.min_length,
            });
        } else if length > MAX_PASSWORD_LENGTH {
            errors.push(PasswordRule::TooLong {
                max: MAX_PASSWORD_LENGTH,
            });
        }
        if !normalized.chars().any(char::is_lowercase) {
            errors.push(PasswordRule::MissingLowercase);
        }
        if !normalized.chars().any(char::is_uppercase) {
            errors.push(PasswordRule::MissingUppercase);
        }
        if !normalized.chars().any(|c| c.is_ascii_digit()) {
            errors.push(PasswordRule::MissingDigit);
        }
        if !normalized
            .chars()
            .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
        {
            errors.push(PasswordRule::MissingSpecial);
        }

        PasswordStrength {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Hash with a fresh 128-bit salt. CPU-bound; call from a blocking
    /// context.
    pub fn hash(&self, password: &ClearTextPassword) -> Result<HashedPassword, PasswordHashError> {
        let params = Params::new(ARGON2_MEMORY_KIB, self.time_cost(), 1, None)
            .map_err(|e| PasswordHashError::InvalidParams(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(OsRng);
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()))?;

        Ok(HashedPassword {
            hash: hash.to_string(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
