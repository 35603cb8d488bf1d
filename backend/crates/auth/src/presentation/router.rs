//! Auth Router

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::application::email::EmailSender;
use crate::application::gateway::AuthGateway;
use crate::domain::value_object::user_role::UserRole;
use crate::infra::dual::PrimaryStore;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::{
    rate_limit_by_user, require_access, require_auth, require_roles,
};

/// Routes to nest under `/api/auth`
pub fn auth_router<P, E>(gateway: Arc<AuthGateway<P, E>>) -> Router
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    let state = AuthAppState { gateway };

    let public = Router::new()
        .route("/register", post(handlers::register::<P, E>))
        .route("/login", post(handlers::login::<P, E>))
        .route("/refresh", post(handlers::refresh::<P, E>))
        .route("/logout", post(handlers::logout::<P, E>))
        .route("/forgot-password", post(handlers::forgot_password::<P, E>))
        .route("/reset-password", post(handlers::reset_password::<P, E>))
        .route("/verify-email", post(handlers::verify_email::<P, E>));

    let admin = Router::new()
        .route("/users/{id}/role", put(handlers::set_role::<P, E>))
        .route("/users/{id}/deactivate", post(handlers::deactivate::<P, E>))
        .route_layer(middleware::from_fn_with_state(
            require_roles(state.clone(), &[UserRole::Admin]),
            require_access::<P, E>,
        ));

    // Layers run bottom-up: authenticate first, then throttle by user
    let protected = Router::new()
        .route("/me", get(handlers::me::<P, E>))
        .route("/sessions", get(handlers::sessions::<P, E>))
        .route("/logout-all", post(handlers::logout_all::<P, E>))
        .route("/change-password", post(handlers::change_password::<P, E>))
        .route(
            "/resend-verification",
            post(handlers::resend_verification::<P, E>),
        )
        .route("/users/{id}", get(handlers::user_profile::<P, E>))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_by_user::<P, E>,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<P, E>,
        ));

    public.merge(protected).with_state(state)
}

/// `GET /health`, for the root router
pub fn health_router<P, E>(gateway: Arc<AuthGateway<P, E>>) -> Router
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(handlers::health::<P, E>))
        .with_state(AuthAppState { gateway })
}
