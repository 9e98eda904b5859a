//! Gateway server setup
//!
//! Provides the WebSocket server configuration and routes.

mod handler;
mod state;

pub use handler::{gateway_handler, GatewayQuery};
pub use state::GatewayState;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use chat_common::{AppConfig, AppError, CorsConfig, JwtService};
use chat_core::SnowflakeGenerator;
use chat_db::{PgMessageRepository, PgUserRepository};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/gateway", get(gateway_handler))
        .route("/health", get(health_check))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Build the complete application
pub fn create_app(state: GatewayState, cors: &CorsConfig, is_production: bool) -> Router {
    create_router()
        .layer(cors_layer(cors, is_production))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the upgrade request
///
/// Configured origins are always honored. With none configured, production
/// blocks cross-origin browsers and development allows any origin.
fn cors_layer(cors: &CorsConfig, is_production: bool) -> CorsLayer {
    let base_layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if !cors.allowed_origins.is_empty() {
        let origins: Vec<HeaderValue> = cors
            .allowed_origins
            .iter()
            .filter_map(|origin| {
                origin.parse::<HeaderValue>().ok().or_else(|| {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                })
            })
            .collect();
        base_layer.allow_origin(AllowOrigin::list(origins))
    } else if is_production {
        tracing::warn!("CORS: no allowed origins configured; browser clients will be blocked");
        base_layer.allow_origin(AllowOrigin::list(Vec::<HeaderValue>::new()))
    } else {
        base_layer.allow_origin(Any)
    }
}

/// Connect to the database and build `GatewayState`
pub async fn create_gateway_state(config: &AppConfig) -> Result<GatewayState, AppError> {
    tracing::info!("Connecting to PostgreSQL...");
    let pool = chat_db::create_pool(&chat_db::DatabaseConfig::from(&config.database))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    tracing::info!("PostgreSQL connection established");

    if config.database.run_migrations {
        chat_db::run_migrations(&pool)
            .await
            .map_err(|e| AppError::Database(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
    }

    let snowflake_generator = Arc::new(SnowflakeGenerator::new(config.snowflake.worker_id));
    let messages = Arc::new(PgMessageRepository::new(pool.clone(), snowflake_generator));
    let users = Arc::new(PgUserRepository::new(pool));

    let jwt = JwtService::new(&config.jwt.secret, config.jwt.access_token_expiry);

    Ok(GatewayState::new(
        messages,
        users,
        jwt,
        config.realtime.clone(),
    ))
}

/// Serve until ctrl-c, then tear down the gateway state
pub async fn run_server(
    app: Router,
    listener: TcpListener,
    state: GatewayState,
) -> Result<(), AppError> {
    let addr = listener
        .local_addr()
        .map_err(|e| AppError::Config(format!("Failed to read local address: {e}")))?;
    tracing::info!("Gateway listening on ws://{}/gateway", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .map_err(|e| AppError::Config(format!("Server error: {e}")))?;

    Ok(())
}

async fn shutdown_signal(state: GatewayState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown signal received");
    state.shutdown();
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr = config.gateway.address();

    let state = create_gateway_state(&config).await?;
    let app = create_app(state.clone(), &config.cors, config.app.env.is_production());

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    run_server(app, listener, state).await
}
