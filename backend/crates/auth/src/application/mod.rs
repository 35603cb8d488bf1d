//! Application Layer
//!
//! Use cases and application services.

pub mod account;
pub mod authorization;
pub mod config;
pub mod email;
pub mod gateway;
pub mod login;
pub mod logout;
pub mod maintenance;
pub mod password_reset;
pub mod refresh;
pub mod register;
pub mod token_service;
pub mod verify_email;

// Re-exports
pub use account::ChangePasswordInput;
pub use authorization::{AuthenticatedUser, AuthorizationEngine};
pub use config::{AuthConfig, ConfigError};
pub use email::{EmailSender, TracingEmailSender};
pub use gateway::{AuthGateway, AuthOutput};
pub use login::LoginInput;
pub use maintenance::{MaintenanceReport, spawn_maintenance};
pub use register::RegisterInput;
pub use token_service::{Claims, TokenPair, TokenService, TokenType};
