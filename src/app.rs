/*
 * Responsibility
 * - Load Config -> build dependencies -> assemble the Router
 * - Apply middleware (CORS / request id / timeout / tracing)
 * - Spawn the periodic session cleanup
 * - Serve with axum::serve()
 */
use std::{panic, process, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::api::v1::handlers::health::health;
use crate::config::Config;
use crate::middleware::{cors, http};
use crate::repos::{CredentialStore, PgCredentialStore, RetryOnce};
use crate::services::auth::{SessionManager, build_session_manager};
use crate::services::authz::{Authorizer, PermissionPolicy};
use crate::services::cache::{CacheClient, ValkeyClient};
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG wins, e.g. RUST_LOG=info,tenant_auth=debug,tower_http=debug
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Development: crash the whole process so it gets noticed.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting auth service in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let cleanup = spawn_session_cleanup(
        state.sessions.clone(),
        Duration::from_secs(config.auth.session_cleanup_interval_seconds),
    );

    let app = build_router(state, &config);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cleanup.abort();
    tracing::info!("auth service stopped");
    Ok(())
}

async fn build_state(config: &Config) -> Result<AppState> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_millis(config.auth.store_timeout_ms))
        .connect(&config.database_url)
        .await
        .context("failed to connect to postgres")?;
    let store: Arc<dyn CredentialStore> = Arc::new(RetryOnce::new(PgCredentialStore::new(pool)));

    let cache: Arc<dyn CacheClient> = Arc::new(
        ValkeyClient::new(&config.redis_url)
            .await
            .context("failed to connect to valkey")?,
    );

    let policy = match &config.auth.policy_file {
        Some(path) => PermissionPolicy::load(path)
            .with_context(|| format!("failed to load policy {}", path.display()))?,
        None => PermissionPolicy::builtin(),
    };

    let sessions = build_session_manager(&config.auth, store, cache)?;

    Ok(AppState::new(sessions, Arc::new(Authorizer::new(policy)))
        .with_exposed_reset_tokens(!config.app_env.is_production()))
}

/// Routes without transport middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api::v1::routes(state.clone()))
        .with_state(state)
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = cors::apply(router(state), config);
    http::apply(router, Duration::from_secs(config.request_timeout_seconds))
}

/// Runs `cleanup_expired_sessions` every `every`. Failures are logged and retried next tick.
pub fn spawn_session_cleanup(sessions: Arc<SessionManager>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match sessions.cleanup_expired_sessions().await {
                Ok(removed) => tracing::debug!(removed, "session cleanup finished"),
                Err(e) => tracing::warn!(error = %e, "session cleanup failed"),
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
