//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository traits
//! - `application/` - Account flows, tokens, authorization
//! - `infra/` - PostgreSQL store, JSON-file fallback store, dual-mode routing
//! - `presentation/` - HTTP handlers, DTOs, router, middleware
//!
//! ## Features
//! - Registration and login by email + password
//! - Short-lived access JWTs, rotating refresh JWTs backed by stored sessions
//! - Email verification and password reset with single-use tokens
//! - Role and permission checks (student, instructor, admin)
//! - Keeps serving from JSON files while PostgreSQL is unreachable
//!
//! ## Security Model
//! - Passwords hashed with Argon2id
//! - Only SHA-256 digests of refresh, reset and verification tokens are stored
//! - Per-email throttle on login and forgot-password, per-user on protected routes
//! - Unknown email, inactive account and wrong password are indistinguishable

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use application::config::AuthConfig;
pub use application::{
    AuthGateway, AuthorizationEngine, EmailSender, TracingEmailSender, spawn_maintenance,
};
pub use error::{AuthError, AuthResult};
pub use infra::{DualModeStore, FileAuthStore, PgAuthRepository};
pub use presentation::router::{auth_router, health_router};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}
