//! Application Configuration
//!
//! Configuration for the Auth application layer, loaded once from the
//! environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use platform::crypto::random_token;
use platform::password::{DEFAULT_MIN_PASSWORD_LENGTH, DEFAULT_ROUNDS, PasswordPolicy};
use platform::rate_limit::RateLimitConfig;
use thiserror::Error;

/// Secrets shorter than this log a warning
pub const MIN_SECRET_LEN: usize = 32;

/// Password-reset tokens live this long
pub const RESET_TOKEN_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 secret for access tokens
    pub jwt_secret: String,
    /// HS256 secret for refresh tokens
    pub jwt_refresh_secret: String,
    pub access_token_ttl: Duration,
    /// Also the session lifetime
    pub refresh_token_ttl: Duration,
    pub issuer: String,
    pub audience: String,
    /// bcrypt-style cost, mapped onto Argon2id time cost
    pub bcrypt_rounds: u32,
    pub password_min_length: usize,
    pub verification_ttl: Duration,
    pub reset_ttl: Duration,
    /// Upper bound on one connectivity probe
    pub probe_timeout: Duration,
    pub fallback_users_file: PathBuf,
    pub fallback_sessions_file: PathBuf,
    /// Per-email throttle on login and forgot-password
    pub auth_rate_limit: RateLimitConfig,
    /// Per-user throttle on protected routes
    pub user_rate_limit: RateLimitConfig,
    pub maintenance_interval: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_refresh_secret: String::new(),
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 3600),
            issuer: "course-platform-api".to_string(),
            audience: "course-platform-client".to_string(),
            bcrypt_rounds: DEFAULT_ROUNDS,
            password_min_length: DEFAULT_MIN_PASSWORD_LENGTH,
            verification_ttl: Duration::from_secs(24 * 3600),
            reset_ttl: RESET_TOKEN_TTL,
            probe_timeout: Duration::from_millis(750),
            fallback_users_file: PathBuf::from("data/fallback_users.json"),
            fallback_sessions_file: PathBuf::from("data/fallback_sessions.json"),
            auth_rate_limit: RateLimitConfig::new(5, Duration::from_secs(60)),
            user_rate_limit: RateLimitConfig::new(100, Duration::from_secs(60)),
            maintenance_interval: Duration::from_secs(15 * 60),
        }
    }
}

impl AuthConfig {
    /// Load from process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from any variable source. Unset variables take their defaults,
    /// except the JWT secrets in release builds.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());

        let duration = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match get(name) {
                Some(value) => parse_duration(&value).ok_or(ConfigError::Invalid { name, value }),
                None => Ok(default),
            }
        };
        let number = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match get(name) {
                Some(value) => match value.trim().parse::<u64>() {
                    Ok(n) => Ok(n),
                    Err(_) => Err(ConfigError::Invalid { name, value }),
                },
                None => Ok(default),
            }
        };

        let jwt_secret = secret("JWT_SECRET", lookup("JWT_SECRET"))?;
        let jwt_refresh_secret = secret("JWT_REFRESH_SECRET", lookup("JWT_REFRESH_SECRET"))?;

        let auth_rate_limit = RateLimitConfig::new(
            number("AUTH_RATE_LIMIT_MAX", defaults.auth_rate_limit.max_requests as u64)? as u32,
            duration("AUTH_RATE_LIMIT_WINDOW", defaults.auth_rate_limit.window)?,
        );
        let user_rate_limit = RateLimitConfig::new(
            number("USER_RATE_LIMIT_MAX", defaults.user_rate_limit.max_requests as u64)? as u32,
            duration("USER_RATE_LIMIT_WINDOW", defaults.user_rate_limit.window)?,
        );

        Ok(Self {
            jwt_secret,
            jwt_refresh_secret,
            access_token_ttl: duration("JWT_EXPIRES_IN", defaults.access_token_ttl)?,
            refresh_token_ttl: duration("JWT_REFRESH_EXPIRES_IN", defaults.refresh_token_ttl)?,
            issuer: get("JWT_ISSUER").unwrap_or(defaults.issuer),
            audience: get("JWT_AUDIENCE").unwrap_or(defaults.audience),
            bcrypt_rounds: number("BCRYPT_ROUNDS", defaults.bcrypt_rounds as u64)? as u32,
            password_min_length: number(
                "PASSWORD_MIN_LENGTH",
                defaults.password_min_length as u64,
            )? as usize,
            verification_ttl: duration("EMAIL_VERIFICATION_TTL", defaults.verification_ttl)?,
            reset_ttl: defaults.reset_ttl,
            probe_timeout: duration("DB_PROBE_TIMEOUT", defaults.probe_timeout)?,
            fallback_users_file: get("FALLBACK_USERS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.fallback_users_file),
            fallback_sessions_file: get("FALLBACK_SESSIONS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.fallback_sessions_file),
            auth_rate_limit,
            user_rate_limit,
            maintenance_interval: duration("MAINTENANCE_INTERVAL", defaults.maintenance_interval)?,
        })
    }

    /// Config for tests and local tools: random secrets, short-cost hashing.
    pub fn development() -> Self {
        Self {
            jwt_secret: random_token(48),
            jwt_refresh_secret: random_token(48),
            bcrypt_rounds: 10,
            ..Default::default()
        }
    }

    pub fn password_policy(&self) -> PasswordPolicy {
        PasswordPolicy::new(self.password_min_length, self.bcrypt_rounds)
    }

    pub fn access_token_ttl_secs(&self) -> i64 {
        self.access_token_ttl.as_secs() as i64
    }

    pub fn refresh_token_ttl_secs(&self) -> i64 {
        self.refresh_token_ttl.as_secs() as i64
    }
}

/// Debug builds mint a per-process secret when unset; release builds refuse
/// to start without one.
fn secret(name: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(v) if v.is_empty() => Err(ConfigError::Empty(name)),
        Some(v) => {
            if v.len() < MIN_SECRET_LEN {
                tracing::warn!(
                    variable = name,
                    length = v.len(),
                    "JWT secret is shorter than {} bytes",
                    MIN_SECRET_LEN
                );
            }
            Ok(v)
        }
        None if cfg!(debug_assertions) => {
            tracing::warn!(variable = name, "JWT secret not set, using a random per-process secret");
            Ok(random_token(48))
        }
        None => Err(ConfigError::Missing(name)),
    }
}

/// Parse `<n>ms`, `<n>s`, `<n>m`, `<n>h`, `<n>d`, or bare seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let n: u64 = digits.parse().ok()?;

    let secs = match unit.trim() {
        "ms" => return Some(Duration::from_millis(n)),
        "" | "s" => n,
        "m" => n.checked_mul(60)?,
        "h" => n.checked_mul(3600)?,
        "d" => n.checked_mul(86_400)?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}
