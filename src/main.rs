use std::sync::Arc;
use std::time::Duration;

use conversation_service::events::redis_bus::start_psub_listener;
use conversation_service::events::RedisBus;
use conversation_service::services::campaigns::OpenCampaignDirectory;
use conversation_service::services::media_store::NullMediaStore;
use conversation_service::services::typing::TypingTracker;
use conversation_service::state::AppState;
use conversation_service::{config, db, error, logging, routes};

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let pool = db::init_pool(&cfg.database_url, cfg.db_max_connections)
        .await
        .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;

    // Schema must be in sync before serving; migration failure is fatal.
    db::MIGRATOR
        .run(&pool)
        .await
        .map_err(|e| error::AppError::StartServer(format!("migrations: {e}")))?;

    let redis_client = redis::Client::open(cfg.redis_url.as_str())
        .map_err(|e| error::AppError::StartServer(format!("redis: {e}")))?;
    let bus = Arc::new(RedisBus::new(redis_client.clone()));

    // Cross-instance fan-out: everything published on conversation:* comes
    // back through this listener into the local subscriber registry.
    let local = bus.local();
    tokio::spawn(async move {
        if let Err(e) = start_psub_listener(redis_client, local).await {
            tracing::error!(error=%e, "redis pubsub listener failed");
        }
    });

    let state = AppState {
        db: pool,
        bus,
        typing: TypingTracker::new(Duration::from_secs(cfg.typing_ttl_seconds)),
        media: Arc::new(NullMediaStore),
        campaigns: Arc::new(OpenCampaignDirectory),
        config: cfg.clone(),
    };

    let app = routes::build_router().with_state(state);
    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting conversation-service");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;

    Ok(())
}
