//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors; request errors go through
//! `auth::AuthError` and `auth::AppError`.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use auth::domain::repository::{ConnectivityProbe, IdentityRepository};
use auth::{
    AuthConfig, AuthGateway, AuthorizationEngine, DualModeStore, FileAuthStore, PgAuthRepository,
    TracingEmailSender, auth_router, health_router, spawn_maintenance,
};
use axum::{
    Router, http,
    http::{Method, header},
};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,auth=info,platform=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AuthConfig::from_env()?;

    // Database pool. Lazy: the server starts even when PostgreSQL is down,
    // but the URL itself is required.
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(config.probe_timeout)
        .connect_lazy(&database_url)?;

    let primary = PgAuthRepository::new(pool.clone(), config.probe_timeout);

    // Migrations and role table only when the database answers now
    let authz = if primary.probe().await {
        sqlx::migrate!("../../../database/migrations")
            .run(&pool)
            .await?;
        tracing::info!("Migrations completed");

        match primary.load_roles().await {
            Ok(roles) if !roles.is_empty() => {
                tracing::info!(roles = roles.len(), "Role permissions loaded");
                AuthorizationEngine::with_roles(roles)
            }
            Ok(_) => AuthorizationEngine::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load roles, using built-in permissions");
                AuthorizationEngine::new()
            }
        }
    } else {
        tracing::warn!("Database unreachable at startup, starting in fallback mode");
        AuthorizationEngine::new()
    };

    let fallback = FileAuthStore::new(
        &config.fallback_users_file,
        &config.fallback_sessions_file,
    );
    let store = Arc::new(DualModeStore::new(primary, fallback));

    // Startup cleanup: remove expired sessions
    // Errors here should not prevent server startup
    match store.sweep_all().await {
        Ok(sessions) => {
            tracing::info!(sessions_deleted = sessions, "Auth session cleanup completed");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Auth session cleanup failed, continuing anyway");
        }
    }

    let gateway = Arc::new(AuthGateway::new(
        store,
        TracingEmailSender,
        authz,
        config,
    ));
    spawn_maintenance(gateway.clone());

    // CORS configuration
    let frontend_origins =
        env::var("FRONTEND_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .merge(health_router(gateway.clone()))
        .nest("/api/auth", auth_router(gateway))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
