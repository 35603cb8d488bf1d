//! HTTP Handlers

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Path, Request, State};
use axum::http::{HeaderMap, StatusCode, request::Parts};
use axum::response::IntoResponse;
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use platform::client::{ClientInfo, extract_client_info};
use serde::de::DeserializeOwned;

use crate::application::authorization::AuthenticatedUser;
use crate::application::email::EmailSender;
use crate::application::gateway::AuthGateway;
use crate::application::{ChangePasswordInput, LoginInput, RegisterInput};
use crate::domain::repository::ConnectivityProbe;
use crate::domain::value_object::{user_id::UserId, user_role::UserRole};
use crate::error::{AuthError, AuthResult};
use crate::infra::dual::PrimaryStore;
use crate::presentation::dto::{
    AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, HealthResponse, LoginRequest,
    LogoutAllResponse, LogoutRequest, MessageResponse, RefreshRequest, RegisterRequest,
    ResetPasswordRequest, SessionResponse, SessionsResponse, SetRoleRequest, TokensResponse,
    UserEnvelope, UserResponse, VerifyEmailRequest,
};

/// Shared state for auth handlers
pub struct AuthAppState<P, E> {
    pub gateway: Arc<AuthGateway<P, E>>,
}

// Manual impl: derive would require P: Clone and E: Clone
impl<P, E> Clone for AuthAppState<P, E> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
        }
    }
}

/// Caller's address and User-Agent. Never rejects.
pub struct ClientContext(pub ClientInfo);

impl<S> FromRequestParts<S> for ClientContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let direct_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());

        Ok(Self(extract_client_info(&parts.headers, direct_ip)))
    }
}

/// JSON request body. Rejections surface as `VALIDATION_ERROR` in the
/// standard error envelope instead of axum's plain-text responses.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection.body_text(), "Rejected request body");
                Err(AuthError::Validation(rejection_message(&rejection)))
            }
        }
    }
}

fn rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "Expected request with `Content-Type: application/json`".into()
        }
        JsonRejection::JsonSyntaxError(_) => "Malformed JSON body".into(),
        JsonRejection::JsonDataError(err) => err.body_text(),
        _ => "Invalid request body".into(),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

fn parse_user_id(raw: &str) -> AuthResult<UserId> {
    UserId::parse_str(raw).map_err(|_| AuthError::Validation("Invalid user id".into()))
}

// ============================================================================
// Register / Login
// ============================================================================

/// POST /api/auth/register
pub async fn register<P, E>(
    State(state): State<AuthAppState<P, E>>,
    ClientContext(client): ClientContext,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> AuthResult<impl IntoResponse>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    let input = RegisterInput {
        email: req.email,
        password: req.password,
        first_name: req.first_name,
        last_name: req.last_name,
        role: req.role,
    };

    let output = state.gateway.register(input, &client).await?;

    Ok((StatusCode::CREATED, Json(AuthResponse::from(output))))
}

/// POST /api/auth/login
pub async fn login<P, E>(
    State(state): State<AuthAppState<P, E>>,
    ClientContext(client): ClientContext,
    JsonBody(req): JsonBody<LoginRequest>,
) -> AuthResult<Json<AuthResponse>>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    let input = LoginInput {
        email: req.email,
        password: req.password,
        remember_me: req.remember_me,
    };

    let output = state.gateway.login(input, &client).await?;

    Ok(Json(AuthResponse::from(output)))
}

// ============================================================================
// Tokens
// ============================================================================

/// POST /api/auth/refresh
pub async fn refresh<P, E>(
    State(state): State<AuthAppState<P, E>>,
    ClientContext(client): ClientContext,
    JsonBody(req): JsonBody<RefreshRequest>,
) -> AuthResult<Json<TokensResponse>>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    let tokens = state.gateway.refresh(&req.refresh_token, &client).await?;

    Ok(Json(TokensResponse { tokens }))
}

/// POST /api/auth/logout
///
/// Always 200. The body is optional and read leniently: a missing,
/// empty or malformed body just means no refresh token was sent.
pub async fn logout<P, E>(
    State(state): State<AuthAppState<P, E>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<MessageResponse>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    let access_token = bearer_token(&headers);
    let refresh_token = serde_json::from_slice::<LogoutRequest>(&body)
        .ok()
        .and_then(|req| req.refresh_token);

    state
        .gateway
        .logout(access_token.as_deref(), refresh_token.as_deref())
        .await;

    Json(MessageResponse::new("Logged out"))
}

/// POST /api/auth/logout-all
pub async fn logout_all<P, E>(
    State(state): State<AuthAppState<P, E>>,
    user: AuthenticatedUser,
) -> AuthResult<Json<LogoutAllResponse>>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    let sessions_invalidated = state.gateway.logout_all(&user).await?;

    Ok(Json(LogoutAllResponse {
        sessions_invalidated,
    }))
}

// ============================================================================
// Password
// ============================================================================

/// POST /api/auth/forgot-password
pub async fn forgot_password<P, E>(
    State(state): State<AuthAppState<P, E>>,
    JsonBody(req): JsonBody<ForgotPasswordRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    let message = state.gateway.forgot_password(&req.email).await?;

    Ok(Json(MessageResponse::new(message)))
}

/// POST /api/auth/reset-password
pub async fn reset_password<P, E>(
    State(state): State<AuthAppState<P, E>>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    state.gateway.reset_password(&req.token, req.password).await?;

    Ok(Json(MessageResponse::new("Password has been reset")))
}

/// POST /api/auth/change-password
pub async fn change_password<P, E>(
    State(state): State<AuthAppState<P, E>>,
    user: AuthenticatedUser,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    let input = ChangePasswordInput {
        current_password: req.current_password,
        new_password: req.new_password,
    };
    state.gateway.change_password(&user, input).await?;

    Ok(Json(MessageResponse::new("Password changed")))
}

// ============================================================================
// Email Verification
// ============================================================================

/// POST /api/auth/verify-email
pub async fn verify_email<P, E>(
    State(state): State<AuthAppState<P, E>>,
    JsonBody(req): JsonBody<VerifyEmailRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    state.gateway.verify_email(&req.token).await?;

    Ok(Json(MessageResponse::new("Email verified")))
}

/// POST /api/auth/resend-verification
pub async fn resend_verification<P, E>(
    State(state): State<AuthAppState<P, E>>,
    user: AuthenticatedUser,
) -> AuthResult<Json<MessageResponse>>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    state.gateway.resend_verification(&user).await?;

    Ok(Json(MessageResponse::new("Verification email sent")))
}

// ============================================================================
// Account
// ============================================================================

/// GET /api/auth/me
pub async fn me<P, E>(
    State(state): State<AuthAppState<P, E>>,
    user: AuthenticatedUser,
) -> AuthResult<Json<UserEnvelope>>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    let identity = state.gateway.current_user(&user).await?;

    Ok(Json(UserEnvelope {
        user: UserResponse::from(&identity),
    }))
}

/// GET /api/auth/sessions
pub async fn sessions<P, E>(
    State(state): State<AuthAppState<P, E>>,
    user: AuthenticatedUser,
) -> AuthResult<Json<SessionsResponse>>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    let sessions = state.gateway.list_sessions(&user).await?;

    Ok(Json(SessionsResponse {
        sessions: sessions
            .iter()
            .map(|s| SessionResponse::new(s, &user.session_id))
            .collect(),
    }))
}

/// GET /api/auth/users/{id}
///
/// The caller's own profile, or anyone's for an admin.
pub async fn user_profile<P, E>(
    State(state): State<AuthAppState<P, E>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AuthResult<Json<UserEnvelope>>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    let target = parse_user_id(&id)?;
    let identity = state.gateway.user_by_id(&user, &target).await?;

    Ok(Json(UserEnvelope {
        user: UserResponse::from(&identity),
    }))
}

/// PUT /api/auth/users/{id}/role
pub async fn set_role<P, E>(
    State(state): State<AuthAppState<P, E>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<SetRoleRequest>,
) -> AuthResult<Json<UserEnvelope>>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    let target = parse_user_id(&id)?;
    let role: UserRole = req.role.parse()?;

    let identity = state.gateway.set_role(&user, &target, role).await?;

    Ok(Json(UserEnvelope {
        user: UserResponse::from(&identity),
    }))
}

/// POST /api/auth/users/{id}/deactivate
pub async fn deactivate<P, E>(
    State(state): State<AuthAppState<P, E>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AuthResult<Json<MessageResponse>>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    let target = parse_user_id(&id)?;
    state.gateway.deactivate(&user, &target).await?;

    Ok(Json(MessageResponse::new("Account deactivated")))
}

// ============================================================================
// Health
// ============================================================================

/// GET /health
pub async fn health<P, E>(State(state): State<AuthAppState<P, E>>) -> Json<HealthResponse>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    let up = state.gateway.store().primary().probe().await;

    Json(HealthResponse {
        status: "ok",
        database: if up { "up" } else { "down" },
    })
}
