//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::{AuthAppState, ClientContext, JsonBody};
pub use middleware::{
    AccessGuard, AccessRule, rate_limit_by_user, require_access, require_auth,
    require_permissions, require_roles,
};
pub use router::{auth_router, health_router};
