//! Platform Crate - Technical Infrastructure
//!
//! Shared technical foundations with no domain knowledge:
//! - Cryptographic utilities (random tokens, SHA-256 digests, Base64)
//! - Password hashing (Argon2id) and strength policy
//! - In-memory fixed-window rate limiting
//! - Client identification from request headers

pub mod client;
pub mod crypto;
pub mod password;
pub mod rate_limit;
