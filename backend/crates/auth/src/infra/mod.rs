//! Infrastructure Layer
//!
//! Storage backends: PostgreSQL, the JSON-file fallback, and the dual-mode
//! router that picks between them per flow.

pub mod dual;
pub mod file;
pub mod postgres;
pub(crate) mod record;

#[cfg(test)]
pub(crate) mod simulated;

pub use dual::{Backend, DualModeStore, PrimaryStore};
pub use file::FileAuthStore;
pub use postgres::PgAuthRepository;
