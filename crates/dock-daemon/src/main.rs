//! dock-daemon entry point.
//!
//! Thin on purpose: load config, connect and migrate, build the shared state,
//! wire middleware, serve. Route handlers live in `routes`; shared state types
//! live in `state`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use dock_config::AppConfig;
use dock_daemon::payments::StripeProvider;
use dock_daemon::{routes, state};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Production injects env vars directly; the file is optional.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = dock_config::load_from_env().context("load config")?;
    let config = AppConfig::from_loaded(&loaded)?;
    info!(config_hash = %loaded.config_hash, "config loaded");
    if config.auth.bypass_active() {
        warn!("auth.dev_bypass is on and no JWKS URL is configured; all requests run as the dev user");
    }

    let secrets = dock_config::resolve_secrets(&config);
    let plans = dock_config::resolve_plan_catalog(&config);
    if secrets.stripe_secret_key.is_none() {
        warn!(
            env = %config.billing.stripe_secret_key_env,
            "stripe secret key not set; checkout and portal will fail"
        );
    }
    let payments = StripeProvider::new(
        config.billing.stripe_api_base.clone(),
        secrets.stripe_secret_key.clone(),
    )?;

    let pool = dock_db::connect_from_env(config.database.max_connections).await?;
    dock_db::migrate(&pool).await?;

    let addr = bind_addr_from_env()
        .map(Ok)
        .unwrap_or_else(|| config.server.addr.parse::<SocketAddr>())
        .context("invalid server.addr")?;
    let cors = cors_from_config(&config);

    let shared = Arc::new(state::AppState::new(pool, config, Arc::new(payments), plans));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    info!("dock-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("DOCK_DAEMON_ADDR").ok()?.parse().ok()
}

fn cors_from_config(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(tower_http::cors::Any)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
