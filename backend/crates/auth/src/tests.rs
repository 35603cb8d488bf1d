//! Flow tests over a dual-mode store whose relational side can be switched
//! off, plus a few requests through the router.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use platform::client::ClientInfo;
use platform::rate_limit::RateLimitConfig;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::application::authorization::{AuthenticatedUser, AuthorizationEngine};
use crate::application::config::AuthConfig;
use crate::application::email::EmailSender;
use crate::application::gateway::AuthGateway;
use crate::application::password_reset::FORGOT_PASSWORD_MESSAGE;
use crate::application::token_service::TokenType;
use crate::application::{ChangePasswordInput, LoginInput, RegisterInput};
use crate::domain::entity::one_time_token::OneTimeToken;
use crate::domain::repository::IdentityRepository;
use crate::domain::value_object::{email::Email, user_role::UserRole};
use crate::error::{AuthError, AuthResult};
use crate::infra::dual::DualModeStore;
use crate::infra::file::FileAuthStore;
use crate::infra::simulated::SimulatedPrimary;
use crate::presentation::handlers::AuthAppState;
use crate::presentation::middleware::{require_access, require_auth, require_permissions};
use crate::presentation::router::auth_router;

const PASSWORD: &str = "Str0ng!Pass";

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct SentEmail {
    kind: &'static str,
    to: String,
    token: Option<String>,
}

#[derive(Default)]
struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingEmailSender {
    fn push(&self, kind: &'static str, to: &Email, token: Option<&str>) {
        self.sent.lock().unwrap().push(SentEmail {
            kind,
            to: to.as_str().to_string(),
            token: token.map(str::to_string),
        });
    }

    fn last_token(&self, kind: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|e| e.kind == kind)
            .and_then(|e| e.token.clone())
    }

    fn count(&self, kind: &str) -> usize {
        self.sent.lock().unwrap().iter().filter(|e| e.kind == kind).count()
    }
}

impl EmailSender for RecordingEmailSender {
    async fn send_verification_email(&self, to: &Email, _name: &str, token: &str) -> AuthResult<()> {
        self.push("verification", to, Some(token));
        Ok(())
    }

    async fn send_password_reset_email(&self, to: &Email, _name: &str, token: &str) -> AuthResult<()> {
        self.push("reset", to, Some(token));
        Ok(())
    }

    async fn send_password_changed_email(&self, to: &Email, _name: &str) -> AuthResult<()> {
        self.push("password_changed", to, None);
        Ok(())
    }
}

type TestGateway = AuthGateway<SimulatedPrimary, RecordingEmailSender>;

struct Harness {
    gateway: Arc<TestGateway>,
    dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(AuthConfig::development())
    }

    fn with_config(config: AuthConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let primary = SimulatedPrimary::in_dir(dir.path().join("primary"));
        let fallback = FileAuthStore::in_dir(dir.path().join("fallback"));
        let store = Arc::new(DualModeStore::new(primary, fallback));

        let gateway = AuthGateway::new(
            store,
            RecordingEmailSender::default(),
            AuthorizationEngine::new(),
            config,
        );

        Self {
            gateway: Arc::new(gateway),
            dir,
        }
    }

    fn set_database_up(&self, up: bool) {
        self.gateway.store().primary().set_reachable(up);
    }

    fn emails(&self) -> &RecordingEmailSender {
        &self.gateway.email
    }

    async fn register(&self, email: &str) -> AuthResult<crate::application::AuthOutput> {
        self.gateway
            .register(register_input(email), &ClientInfo::default())
            .await
    }

    async fn login(&self, email: &str, password: &str) -> AuthResult<crate::application::AuthOutput> {
        self.gateway
            .login(
                LoginInput {
                    email: email.to_string(),
                    password: password.to_string(),
                    remember_me: false,
                },
                &ClientInfo::default(),
            )
            .await
    }

    /// Register and promote straight through the relational store
    async fn admin(&self, email: &str) -> AuthenticatedUser {
        let output = self.register(email).await.unwrap();
        self.gateway
            .store()
            .primary()
            .set_role(&output.identity.id, UserRole::Admin)
            .await
            .unwrap();
        self.gateway
            .authenticate(&output.tokens.access_token)
            .await
            .unwrap()
    }
}

fn register_input(email: &str) -> RegisterInput {
    RegisterInput {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        role: None,
    }
}

// ============================================================================
// Register / Login
// ============================================================================

#[tokio::test]
async fn test_register_then_login() {
    let h = Harness::new();

    let registered = h.register("ada@example.com").await.unwrap();
    assert!(!registered.fallback_mode);
    assert_eq!(registered.identity.role, UserRole::Student);
    assert!(!registered.identity.is_email_verified());
    assert_eq!(registered.tokens.token_type, "Bearer");
    assert_eq!(h.emails().count("verification"), 1);

    let logged_in = h.login("ADA@example.com", PASSWORD).await.unwrap();
    assert_eq!(logged_in.identity.id, registered.identity.id);
    assert!(logged_in.identity.last_login_at.is_some());

    let claims = h
        .gateway
        .tokens()
        .verify(&logged_in.tokens.access_token, TokenType::Access)
        .unwrap();
    assert_eq!(claims.user_id, registered.identity.id);
    assert_eq!(claims.email, "ada@example.com");
}

#[tokio::test]
async fn test_register_rejects_weak_password_and_admin_role() {
    let h = Harness::new();

    let mut weak = register_input("ada@example.com");
    weak.password = "password".to_string();
    let err = h.gateway.register(weak, &ClientInfo::default()).await.unwrap_err();
    assert!(matches!(err, AuthError::WeakPassword(_)));

    let mut admin = register_input("ada@example.com");
    admin.role = Some("admin".to_string());
    let err = h.gateway.register(admin, &ClientInfo::default()).await.unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
}

#[tokio::test]
async fn test_duplicate_email_rejected_on_each_backend() {
    let h = Harness::new();

    h.register("ada@example.com").await.unwrap();
    let err = h.register("Ada@Example.com").await.unwrap_err();
    assert!(matches!(err, AuthError::EmailTaken));

    h.set_database_up(false);
    h.register("grace@example.com").await.unwrap();
    let err = h.register("grace@example.com").await.unwrap_err();
    assert!(matches!(err, AuthError::EmailTaken));
}

#[tokio::test]
async fn test_login_failures_look_the_same() {
    let h = Harness::new();
    h.register("ada@example.com").await.unwrap();

    let wrong = h.login("ada@example.com", "Wr0ng!Pass").await.unwrap_err();
    let unknown = h.login("nobody@example.com", PASSWORD).await.unwrap_err();
    let malformed = h.login("not-an-email", PASSWORD).await.unwrap_err();

    for err in [wrong, unknown, malformed] {
        assert!(matches!(err, AuthError::InvalidCredentials), "{:?}", err);
    }
}

#[tokio::test]
async fn test_login_rate_limited_per_email() {
    let h = Harness::new();
    h.register("ada@example.com").await.unwrap();

    for _ in 0..5 {
        let _ = h.login("ada@example.com", "Wr0ng!Pass").await;
    }
    let err = h.login("ada@example.com", PASSWORD).await.unwrap_err();
    assert!(matches!(err, AuthError::RateLimited { retry_after_secs } if retry_after_secs > 0));

    // Other addresses are unaffected
    h.register("grace@example.com").await.unwrap();
    assert!(h.login("grace@example.com", PASSWORD).await.is_ok());
}

// ============================================================================
// Fallback mode
// ============================================================================

#[tokio::test]
async fn test_fallback_serves_while_database_is_down() {
    let h = Harness::new();
    h.set_database_up(false);

    let output = h.register("ada@example.com").await.unwrap();
    assert!(output.fallback_mode);
    assert!(h.gateway.store().is_degraded());

    let users_file = h.dir.path().join("fallback").join("fallback_users.json");
    let users = std::fs::read_to_string(users_file).unwrap();
    assert!(users.contains("ada@example.com"));

    let email = Email::new("ada@example.com").unwrap();
    assert!(
        h.gateway
            .store()
            .primary()
            .find_by_email(&email)
            .await
            .unwrap()
            .is_none()
    );

    let logged_in = h.login("ada@example.com", PASSWORD).await.unwrap();
    assert!(logged_in.fallback_mode);
}

#[tokio::test]
async fn test_recovery_switches_back_without_replication() {
    let h = Harness::new();

    h.set_database_up(false);
    h.register("ada@example.com").await.unwrap();

    h.set_database_up(true);
    let err = h.login("ada@example.com", PASSWORD).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(!h.gateway.store().is_degraded());

    let output = h.register("ada@example.com").await.unwrap();
    assert!(!output.fallback_mode);
}

#[tokio::test]
async fn test_each_flow_probes_once() {
    let h = Harness::new();
    let output = h.register("ada@example.com").await.unwrap();
    let before = h.gateway.store().primary().probe_count();

    h.gateway
        .refresh(&output.tokens.refresh_token, &ClientInfo::default())
        .await
        .unwrap();

    assert_eq!(h.gateway.store().primary().probe_count(), before + 1);
}

// ============================================================================
// Refresh / Logout
// ============================================================================

#[tokio::test]
async fn test_refresh_rotates_the_token() {
    let h = Harness::new();
    let output = h.register("ada@example.com").await.unwrap();
    let old = output.tokens.refresh_token;

    let rotated = h.gateway.refresh(&old, &ClientInfo::default()).await.unwrap();
    assert_ne!(rotated.refresh_token, old);

    let err = h.gateway.refresh(&old, &ClientInfo::default()).await.unwrap_err();
    assert!(matches!(err, AuthError::SessionInvalid));

    assert!(h.gateway.refresh(&rotated.refresh_token, &ClientInfo::default()).await.is_ok());
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let h = Harness::new();
    let output = h.register("ada@example.com").await.unwrap();

    let err = h
        .gateway
        .refresh(&output.tokens.access_token, &ClientInfo::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenInvalid));
}

#[tokio::test]
async fn test_logout_ends_the_session() {
    let h = Harness::new();
    let output = h.register("ada@example.com").await.unwrap();

    h.gateway.logout(Some(&output.tokens.access_token), None).await;

    let err = h
        .gateway
        .refresh(&output.tokens.refresh_token, &ClientInfo::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::SessionInvalid));

    // Garbage and absent tokens are ignored
    h.gateway.logout(Some("garbage"), Some("garbage")).await;
    h.gateway.logout(None, None).await;
}

#[tokio::test]
async fn test_logout_all_ends_every_session() {
    let h = Harness::new();
    let first = h.register("ada@example.com").await.unwrap();
    let second = h.login("ada@example.com", PASSWORD).await.unwrap();

    let user = h.gateway.authenticate(&second.tokens.access_token).await.unwrap();
    assert_eq!(h.gateway.list_sessions(&user).await.unwrap().len(), 2);

    assert_eq!(h.gateway.logout_all(&user).await.unwrap(), 2);
    for token in [first.tokens.refresh_token, second.tokens.refresh_token] {
        let err = h.gateway.refresh(&token, &ClientInfo::default()).await.unwrap_err();
        assert!(matches!(err, AuthError::SessionInvalid));
    }
}

// ============================================================================
// Password reset / Verification
// ============================================================================

#[tokio::test]
async fn test_forgot_password_does_not_reveal_accounts() {
    let h = Harness::new();
    h.register("ada@example.com").await.unwrap();

    let known = h.gateway.forgot_password("ada@example.com").await.unwrap();
    let unknown = h.gateway.forgot_password("nobody@example.com").await.unwrap();

    assert_eq!(known, FORGOT_PASSWORD_MESSAGE);
    assert_eq!(unknown, known);
    assert_eq!(h.emails().count("reset"), 1);

    let sent = h.emails().sent.lock().unwrap();
    assert_eq!(sent.last().unwrap().to, "ada@example.com");
}

#[tokio::test]
async fn test_reset_with_unknown_token_is_not_found() {
    let h = Harness::new();

    let err = h
        .gateway
        .reset_password("no-such-token", "N3w!Password".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ResetTokenInvalid));
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expired_reset_token_is_not_found() {
    let h = Harness::new();
    let output = h.register("ada@example.com").await.unwrap();

    let (raw, token) = OneTimeToken::issue(chrono::Duration::seconds(-60));
    let primary = h.gateway.store().primary();
    primary.set_reset_token(&output.identity.id, &token).await.unwrap();

    assert!(primary.find_by_reset_token(&token.digest).await.unwrap().is_none());

    let err = h
        .gateway
        .reset_password(&raw, "N3w!Password".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ResetTokenInvalid));
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

    // Old password still works
    assert!(h.login("ada@example.com", PASSWORD).await.is_ok());
}

#[tokio::test]
async fn test_reset_password_end_to_end() {
    let h = Harness::new();
    let output = h.register("ada@example.com").await.unwrap();

    h.gateway.forgot_password("ada@example.com").await.unwrap();
    let token = h.emails().last_token("reset").unwrap();

    h.gateway
        .reset_password(&token, "N3w!Password".to_string())
        .await
        .unwrap();
    assert_eq!(h.emails().count("password_changed"), 1);

    // Token is single use
    let err = h
        .gateway
        .reset_password(&token, "An0ther!Pass".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ResetTokenInvalid));

    // Existing sessions ended, old password rejected, new one accepted
    let err = h
        .gateway
        .refresh(&output.tokens.refresh_token, &ClientInfo::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::SessionInvalid));
    assert!(h.login("ada@example.com", PASSWORD).await.is_err());
    assert!(h.login("ada@example.com", "N3w!Password").await.is_ok());
}

#[tokio::test]
async fn test_verify_email() {
    let h = Harness::new();
    let output = h.register("ada@example.com").await.unwrap();
    let token = h.emails().last_token("verification").unwrap();

    h.gateway.verify_email(&token).await.unwrap();

    let user = h.gateway.authenticate(&output.tokens.access_token).await.unwrap();
    assert!(h.gateway.current_user(&user).await.unwrap().is_email_verified());

    let err = h.gateway.verify_email(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::VerificationTokenInvalid));

    let err = h.gateway.resend_verification(&user).await.unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
}

#[tokio::test]
async fn test_change_password_requires_current() {
    let h = Harness::new();
    let output = h.register("ada@example.com").await.unwrap();
    let user = h.gateway.authenticate(&output.tokens.access_token).await.unwrap();

    let err = h
        .gateway
        .change_password(
            &user,
            ChangePasswordInput {
                current_password: "Wr0ng!Pass".to_string(),
                new_password: "N3w!Password".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::IncorrectPassword));

    h.gateway
        .change_password(
            &user,
            ChangePasswordInput {
                current_password: PASSWORD.to_string(),
                new_password: "N3w!Password".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(h.login("ada@example.com", "N3w!Password").await.is_ok());
}

// ============================================================================
// Admin
// ============================================================================

#[tokio::test]
async fn test_admin_manages_accounts() {
    let h = Harness::new();
    let admin = h.admin("root@example.com").await;
    let student = h.register("ada@example.com").await.unwrap();

    let updated = h
        .gateway
        .set_role(&admin, &student.identity.id, UserRole::Instructor)
        .await
        .unwrap();
    assert_eq!(updated.role, UserRole::Instructor);

    // Role is read from storage on every request
    let user = h.gateway.authenticate(&student.tokens.access_token).await.unwrap();
    assert_eq!(user.role, UserRole::Instructor);

    h.gateway.deactivate(&admin, &student.identity.id).await.unwrap();
    let err = h.gateway.authenticate(&student.tokens.access_token).await.unwrap_err();
    assert!(matches!(err, AuthError::AccountInactive));
    assert!(h.login("ada@example.com", PASSWORD).await.is_err());

    let err = h.gateway.deactivate(&admin, &admin.user_id).await.unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
}

#[tokio::test]
async fn test_students_cannot_manage_accounts() {
    let h = Harness::new();
    let ada = h.register("ada@example.com").await.unwrap();
    let grace = h.register("grace@example.com").await.unwrap();
    let user = h.gateway.authenticate(&ada.tokens.access_token).await.unwrap();

    let err = h
        .gateway
        .set_role(&user, &grace.identity.id, UserRole::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Forbidden));

    let err = h.gateway.deactivate(&user, &grace.identity.id).await.unwrap_err();
    assert!(matches!(err, AuthError::Forbidden));
}

// ============================================================================
// HTTP
// ============================================================================

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_http_register_and_me() {
    let h = Harness::new();
    let app = auth_router(h.gateway.clone());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/register",
            serde_json::json!({
                "email": "ada@example.com",
                "password": PASSWORD,
                "firstName": "Ada",
                "lastName": "Lovelace",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(body["fallback_mode"], false);
    assert!(body["user"].get("password_hash").is_none());
    let access = body["tokens"]["access_token"].as_str().unwrap().to_string();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", access))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["first_name"], "Ada");
}

#[tokio::test]
async fn test_http_protected_route_requires_token() {
    let h = Harness::new();
    let app = auth_router(h.gateway.clone());

    let response = app
        .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_http_logout_always_succeeds() {
    let h = Harness::new();
    let app = auth_router(h.gateway.clone());

    let response = app
        .oneshot(json_request(
            "POST",
            "/logout",
            serde_json::json!({ "refresh_token": "garbage" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

fn bearer_request(method: &str, uri: &str, access: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", access))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_http_logout_with_empty_body_ends_session() {
    let h = Harness::new();
    let output = h.register("ada@example.com").await.unwrap();
    let app = auth_router(h.gateway.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/logout")
                .header(header::AUTHORIZATION, format!("Bearer {}", output.tokens.access_token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let err = h
        .gateway
        .refresh(&output.tokens.refresh_token, &ClientInfo::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::SessionInvalid));

    // Non-JSON bodies are ignored too
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/logout")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("bye"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_http_malformed_json_is_validation_error() {
    let h = Harness::new();
    let app = auth_router(h.gateway.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email":"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/login")
                .body(Body::from("email=ada"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_http_admin_routes_forbid_students() {
    let h = Harness::new();
    let student = h.register("ada@example.com").await.unwrap();
    let grace = h.register("grace@example.com").await.unwrap();
    let app = auth_router(h.gateway.clone());

    let uri = format!("/users/{}/role", grace.identity.id);
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(&uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", student.tokens.access_token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::json!({ "role": "instructor" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"]["code"], "INSUFFICIENT_PERMISSIONS");

    let uri = format!("/users/{}/deactivate", grace.identity.id);
    let response = app
        .clone()
        .oneshot(bearer_request("POST", &uri, &student.tokens.access_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Without a token the answer is 401, not 403
    let response = app
        .oneshot(Request::builder().method("POST").uri(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_http_user_profile_is_owner_or_admin() {
    let h = Harness::new();
    let ada = h.register("ada@example.com").await.unwrap();
    let grace = h.register("grace@example.com").await.unwrap();
    let app = auth_router(h.gateway.clone());

    let own = format!("/users/{}", ada.identity.id);
    let other = format!("/users/{}", grace.identity.id);

    let response = app
        .clone()
        .oneshot(bearer_request("GET", &own, &ada.tokens.access_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["email"], "ada@example.com");

    let response = app
        .clone()
        .oneshot(bearer_request("GET", &other, &ada.tokens.access_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = h.admin("root@example.com").await;
    let admin_login = h.login("root@example.com", PASSWORD).await.unwrap();
    assert_eq!(admin_login.identity.id, admin.user_id);
    let response = app
        .oneshot(bearer_request("GET", &other, &admin_login.tokens.access_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["email"], "grace@example.com");
}

#[tokio::test]
async fn test_http_permission_guard() {
    let h = Harness::new();
    let state = AuthAppState {
        gateway: h.gateway.clone(),
    };
    let app = axum::Router::new()
        .route("/courses", axum::routing::post(|| async { "created" }))
        .route_layer(axum::middleware::from_fn_with_state(
            require_permissions(state.clone(), &["courses:write"]),
            require_access::<SimulatedPrimary, RecordingEmailSender>,
        ))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            require_auth::<SimulatedPrimary, RecordingEmailSender>,
        ));

    let student = h.register("ada@example.com").await.unwrap();
    let mut input = register_input("grace@example.com");
    input.role = Some("instructor".to_string());
    let instructor = h.gateway.register(input, &ClientInfo::default()).await.unwrap();

    let response = app
        .clone()
        .oneshot(bearer_request("POST", "/courses", &student.tokens.access_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(bearer_request("POST", "/courses", &instructor.tokens.access_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_http_user_rate_limit() {
    let mut config = AuthConfig::development();
    config.user_rate_limit = RateLimitConfig::new(2, Duration::from_secs(60));
    let h = Harness::with_config(config);
    let output = h.register("ada@example.com").await.unwrap();
    let app = auth_router(h.gateway.clone());

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(bearer_request("GET", "/me", &output.tokens.access_token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(bearer_request("GET", "/me", &output.tokens.access_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(body_json(response).await["error"]["code"], "RATE_LIMIT_EXCEEDED");

    // Another user has their own budget
    let grace = h.register("grace@example.com").await.unwrap();
    let response = app
        .oneshot(bearer_request("GET", "/me", &grace.tokens.access_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Maintenance
// ============================================================================

#[tokio::test]
async fn test_maintenance_sweeps_dead_sessions() {
    let h = Harness::new();
    let output = h.register("ada@example.com").await.unwrap();
    h.login("ada@example.com", PASSWORD).await.unwrap();

    h.gateway.logout(Some(&output.tokens.access_token), None).await;

    let report = h.gateway.run_maintenance().await;
    assert_eq!(report.sessions_removed, 1);

    let user = h.gateway.authenticate(&output.tokens.access_token).await.unwrap();
    assert_eq!(h.gateway.list_sessions(&user).await.unwrap().len(), 1);
}
