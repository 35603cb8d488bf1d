//! Domain Layer
//!
//! Contains entities, value objects, and repository traits.

pub mod entity;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{identity::Identity, one_time_token::OneTimeToken, session::Session};
pub use repository::{ConnectivityProbe, IdentityRepository, SessionRepository};
