//! Pixelwall API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod dto;
mod error;
mod handlers;
mod state;

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::Method;
use axum::routing::get;
use pixelwall_application::{
    AccessEventRecorder, AccessEventRepository, ClassificationConfig, ClassificationService,
    RateWindowCounter, RuleCache, RuleRepository,
};
use pixelwall_core::AppError;
use pixelwall_infrastructure::{PostgresAccessEventRepository, PostgresRuleRepository};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::api_config::ApiConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let rule_repository: Arc<dyn RuleRepository> =
        Arc::new(PostgresRuleRepository::new(pool.clone()));
    let event_repository: Arc<dyn AccessEventRepository> =
        Arc::new(PostgresAccessEventRepository::new(pool.clone()));

    let rule_cache = Arc::new(RuleCache::new(
        rule_repository,
        config.rule_cache_ttl_seconds,
        chrono::Utc::now(),
    ));
    let rate_windows = Arc::new(RateWindowCounter::new());

    let classification_config = ClassificationConfig {
        window_seconds: config.window_seconds,
        ip_ceiling: config.ip_ceiling,
        tenant_ceiling: config.tenant_ceiling,
        store_timeout_ms: config.store_timeout_ms,
    };
    let classification_service = ClassificationService::new(
        classification_config,
        rate_windows.clone(),
        rule_cache,
        event_repository.clone(),
    );
    let event_recorder = AccessEventRecorder::new(event_repository);

    spawn_window_pruner(rate_windows, config.window_seconds);

    let app_state = AppState {
        classification_service,
        event_recorder,
        public_base_url: config.public_base_url.clone(),
    };

    // The pixel and snippet are fetched from third-party pages.
    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    let app = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/detect/{tenant}", get(handlers::detect::detect_pixel_handler))
        .route(
            "/embed/snippet.js",
            get(handlers::embed::embed_snippet_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state);

    let host = IpAddr::from_str(&config.api_host).map_err(|error| {
        AppError::Internal(format!("invalid API_HOST '{}': {error}", config.api_host))
    })?;
    let address = SocketAddr::from((host, config.api_port));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "pixelwall-api listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}

/// Periodically drops rate windows with no activity inside the current
/// window, keeping the counter map bounded by active clients.
fn spawn_window_pruner(rate_windows: Arc<RateWindowCounter>, window_seconds: i64) {
    let period = Duration::from_secs(window_seconds.max(1).unsigned_abs());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let dropped = rate_windows
                .prune_idle(chrono::Utc::now(), window_seconds)
                .await;
            if dropped > 0 {
                debug!(dropped, "pruned idle rate windows");
            }
        }
    });
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
