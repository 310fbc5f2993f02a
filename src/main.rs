mod collab;
mod config;
mod db;
mod docs;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
mod websocket;

use config::Config;
use db::{DbCollab, MemoryOperationStore, OperationStore};
use routes::create_app;
use state::AppState;
use std::panic;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use collab::CollabService;

/// Pick the durable sink for the operation log
async fn init_store(config: &Config) -> Arc<dyn OperationStore> {
    let Some(db_url) = &config.db_url else {
        warn!("No database URL configured - operations are only kept in memory");
        return Arc::new(MemoryOperationStore::new());
    };

    match DbCollab::new(db_url).await {
        Ok(db) => match db.ensure_schema().await {
            Ok(()) => {
                info!("Database initialized successfully");
                Arc::new(db)
            }
            Err(e) => {
                error!("Failed to prepare database schema: {}", e);
                warn!("Falling back to the in-memory operation store");
                Arc::new(MemoryOperationStore::new())
            }
        },
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            warn!("Falling back to the in-memory operation store");
            Arc::new(MemoryOperationStore::new())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Default to info level, but allow debug for our app
            "brd_collab=debug,tower_http=debug,axum::rejection=trace,info".into()
        }))
        .init();

    info!("Starting server...");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });

    info!("Service {} running in {} mode", config.cloud_service_name, config.environment);
    if config.cloud_auth_jwt_secret.is_none() {
        if config.is_production() {
            error!("No JWT secret configured in production - API and WebSocket are open");
        } else {
            warn!("No JWT secret configured - API and WebSocket are open and join userIds are trusted");
        }
    }

    let store = init_store(&config).await;
    let service = Arc::new(CollabService::new(config.collab_settings(), store));
    let state = AppState::new(config.clone(), service.clone());

    // Background tasks
    state.hub.clone().spawn_event_forwarder();
    service
        .clone()
        .spawn_mention_sweeper(config.mention_retention_days, config.mention_sweep_interval());

    let app = create_app(state);

    let listener = match tokio::net::TcpListener::bind(config.server_address()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", config.server_address(), e);
            std::process::exit(1);
        }
    };

    info!("🚀 Server running on http://{}", config.server_address());
    info!("📡 WebSocket available at ws://{}/ws", config.server_address());
    info!("📚 Swagger UI available at http://{}/swagger", config.server_address());

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
}
