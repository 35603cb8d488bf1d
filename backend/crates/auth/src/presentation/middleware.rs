//! Auth Middleware
//!
//! `require_auth` resolves the Bearer token and stores the caller in request
//! extensions; handlers take it back out with the [`AuthenticatedUser`]
//! extractor. `rate_limit_by_user` runs after it on the same routes, and
//! `require_access` narrows individual routes to roles or permissions.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use platform::client::extract_client_ip;

use crate::application::authorization::AuthenticatedUser;
use crate::application::email::EmailSender;
use crate::domain::value_object::user_role::UserRole;
use crate::error::AuthError;
use crate::infra::dual::PrimaryStore;
use crate::presentation::handlers::AuthAppState;

/// Middleware that requires a valid access token
pub async fn require_auth<P, E>(
    State(state): State<AuthAppState<P, E>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    let token = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(AuthError::MissingToken)?;

    let user = state.gateway.authenticate(token.token()).await?;
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Per-caller throttle. Keyed by user id when authenticated, else client IP.
pub async fn rate_limit_by_user<P, E>(
    State(state): State<AuthAppState<P, E>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    let key = match req.extensions().get::<AuthenticatedUser>() {
        Some(user) => format!("user:{}", user.user_id),
        None => {
            let direct_ip = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip());
            match extract_client_ip(req.headers(), direct_ip) {
                Some(ip) => format!("ip:{}", ip),
                None => "ip:unknown".to_string(),
            }
        }
    };

    if let Err(e) = state.gateway.check_user_rate(&key) {
        tracing::warn!(key = %key, "User rate limit exceeded");
        return Err(e);
    }

    Ok(next.run(req).await)
}

/// What a guarded route demands of the caller
#[derive(Debug, Clone, Copy)]
pub enum AccessRule {
    /// Caller's role must be one of these
    Roles(&'static [UserRole]),
    /// Caller must hold at least one of these permissions
    Permissions(&'static [&'static str]),
}

/// State for [`require_access`]
pub struct AccessGuard<P, E> {
    pub state: AuthAppState<P, E>,
    pub rule: AccessRule,
}

impl<P, E> Clone for AccessGuard<P, E> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            rule: self.rule,
        }
    }
}

/// Guard for routes restricted to the given roles
pub fn require_roles<P, E>(
    state: AuthAppState<P, E>,
    roles: &'static [UserRole],
) -> AccessGuard<P, E> {
    AccessGuard {
        state,
        rule: AccessRule::Roles(roles),
    }
}

/// Guard for routes that need one of the listed permissions
pub fn require_permissions<P, E>(
    state: AuthAppState<P, E>,
    permissions: &'static [&'static str],
) -> AccessGuard<P, E> {
    AccessGuard {
        state,
        rule: AccessRule::Permissions(permissions),
    }
}

/// Checks the authenticated caller against the guard's rule.
/// Must sit inside `require_auth`; without a caller it answers 401.
pub async fn require_access<P, E>(
    State(guard): State<AccessGuard<P, E>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    let user = req
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or(AuthError::MissingToken)?;

    let authz = guard.state.gateway.authz();
    let outcome = match guard.rule {
        AccessRule::Roles(roles) => authz.authorize_role(user, roles),
        AccessRule::Permissions(permissions) => authz.authorize(user, permissions),
    };
    if let Err(e) = outcome {
        tracing::warn!(user_id = %user.user_id, rule = ?guard.rule, "Access denied");
        return Err(e);
    }

    Ok(next.run(req).await)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}
