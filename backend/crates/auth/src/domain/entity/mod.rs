//! Entity Module

pub mod identity;
pub mod one_time_token;
pub mod session;
