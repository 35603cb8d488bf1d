//! Value Object Module

pub mod email;
pub mod permission;
pub mod user_id;
pub mod user_password;
pub mod user_role;
