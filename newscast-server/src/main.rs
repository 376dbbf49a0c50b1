//! newscast-server - Tag-Matching & Fan-out Delivery service
//!
//! Classifies incoming news items against the tag universe with a
//! multi-phase matching pipeline, resolves the relevant subscribers and
//! delivers the content to their registered channels inside each
//! subscriber's preferred delivery window.

use anyhow::Result;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use newscast_common::config::Config;
use newscast_common::events::EventBus;
use newscast_server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting newscast-server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Optional config file path as the first CLI argument
    let config_arg: Option<PathBuf> = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_arg.as_deref())?;

    let db_pool = newscast_server::db::init_database_pool(&config.database_path).await?;
    info!("Database: {}", config.database_path.display());

    let event_bus = EventBus::new(100);

    let state = AppState::new(&config, db_pool, event_bus)?;
    let app = newscast_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("Listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
