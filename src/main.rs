use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linknest::api::{self, AppState};
use linknest::auth::AuthService;
use linknest::config::Config;
use linknest::engines::{
    InteractionEngine, MessagingEngine, NotificationEngine, RelationshipEngine, UnreadsEngine,
};
use linknest::external::{LogNotifier, NullObjectStorage};
use linknest::pubsub::PubSub;
use linknest::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,linknest=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    Config::init()?;
    info!("Initialized configuration");

    // Wire the store, the fan-out bus and the engines
    let store = Arc::new(Store::new());
    let bus = Arc::new(PubSub::default());
    let auth = Arc::new(AuthService::new(store.clone()));
    let unreads = Arc::new(UnreadsEngine::new(store.clone(), bus.clone()));
    let notifications = Arc::new(NotificationEngine::new(
        store.clone(),
        bus.clone(),
        unreads.clone(),
        Arc::new(LogNotifier),
    ));
    let relationships = Arc::new(RelationshipEngine::new(
        store.clone(),
        bus.clone(),
        notifications.clone(),
    ));
    let messaging = Arc::new(MessagingEngine::new(
        store.clone(),
        bus.clone(),
        notifications.clone(),
        unreads.clone(),
    ));
    let interactions = Arc::new(InteractionEngine::new(store.clone(), bus.clone()));
    let state = AppState {
        store,
        bus,
        auth,
        unreads,
        notifications,
        relationships,
        messaging,
        interactions,
        storage: Arc::new(NullObjectStorage),
    };

    // Start API server
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::start_api_server(state).await {
            error!("API server error: {}", e);
        }
    });

    // Handle shutdown signals
    tokio::select! {
        _ = api_handle => {
            error!("API server stopped unexpectedly");
        }
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Shutdown signal received, initiating graceful shutdown"),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        }
    }

    info!("Linknest shutdown complete");
    Ok(())
}
