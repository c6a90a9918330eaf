//! Kedai admin - back-office JSON API.
//!
//! Serves catalog, inventory, order, shipping, review, settings and user
//! management endpoints on port 3001.
//!
//! # Security
//!
//! **This binary holds the privileged credentials and should only be
//! reachable from the staff network.**
//!
//! - Stripe secret key (refunds)
//! - EasyParcel API key (spends the shipping wallet)
//! - Supabase service role key (Storage writes)
//! - Optional SMTP credentials
//!
//! Login is limited to `staff` and `admin` profiles. Roles are re-read on
//! every request through the role cache, so demotions apply immediately.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{Request, Response};
use sentry::integrations::tracing as sentry_tracing;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kedai_admin::config::AdminConfig;
use kedai_admin::services::RoleCache;
use kedai_admin::state::AppState;
use kedai_admin::{app, db, health, middleware};

const DEFAULT_LOG_FILTER: &str = "kedai_admin=info,tower_http=info";

/// Start Sentry when a DSN is configured. The guard flushes on drop.
fn init_sentry(config: &AdminConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            server_name: Some("kedai-admin".into()),
            traces_sample_rate: 0.1,
            attach_stacktrace: true,
            send_default_pii: false,
            ..Default::default()
        },
    ));
    Some(guard)
}

/// WARN and ERROR become Sentry events; INFO and DEBUG become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// `RUST_LOG` wins over the default filter. `LOG_FORMAT=json` switches to
/// one JSON object per line.
fn init_tracing(json_logs: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let json_layer = json_logs.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!json_logs).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

/// Root span of every request. `request_id` is filled in by the request ID
/// middleware.
fn request_span<B>(request: &Request<B>) -> Span {
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = tracing::field::Empty,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    )
}

fn record_response<B>(response: &Response<B>, latency: Duration, span: &Span) {
    span.record("status", response.status().as_u16());
    span.record(
        "latency_ms",
        u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
    );
    DefaultOnResponse::default().on_response(response, latency, span);
}

/// Connect the role cache, falling back to the in-process cache when Redis
/// is configured but unreachable.
async fn role_cache(config: &AdminConfig) -> RoleCache {
    match RoleCache::connect(&config.role_cache).await {
        Ok(cache) => cache,
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, using in-process role cache");
            RoleCache::in_memory(config.role_cache.ttl)
        }
    }
}

#[tokio::main]
async fn main() {
    let config = AdminConfig::from_env().expect("Failed to load configuration");

    // Sentry before the subscriber so the tracing layer has a client.
    let _sentry_guard = init_sentry(&config);
    init_tracing(config.json_logs);

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // Migrations only run through `kedai-cli migrate`.
    let roles = role_cache(&config).await;
    let session_layer = middleware::create_session_layer(&pool, &config);
    let state = AppState::new(config.clone(), pool, roles)
        .expect("Failed to initialize application state");

    let app = health::routes()
        .merge(app(&state).layer(session_layer))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(record_response),
        )
        .with_state(state)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!(%addr, "admin listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    tracing::info!("admin stopped");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
