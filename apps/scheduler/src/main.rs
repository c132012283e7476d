use std::sync::Arc;

use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dispatch_cell::{LogSender, ScheduledDispatchWindower};
use shared_config::SchedulingConfig;
use shared_store::MemoryStore;
use shared_utils::SystemClock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting appointment scheduler");

    let config = SchedulingConfig::from_env();
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(SystemClock);

    let windower = Arc::new(ScheduledDispatchWindower::new(
        Arc::clone(&store) as _,
        Arc::clone(&store) as _,
        Arc::new(LogSender::new(Arc::clone(&store) as _)),
        clock,
        config,
    ));
    let handle = windower.start();
    info!("Dispatch windower running");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    handle.stop().await;

    Ok(())
}
