mod auth;
mod config;
mod error;
mod routes;

use std::sync::Arc;

use brokerkb_core::index::{DifyClient, DocumentIndex};
use brokerkb_core::services::DatabaseService;
use config::AppConfig;
use routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("brokerkb_api=info".parse()?)
                .add_directive("brokerkb_core=info".parse()?),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting brokerkb-api with config: {:?}", config);

    let db = DatabaseService::open_path(config.db_path.clone()).await?;
    let index: Option<Arc<dyn DocumentIndex>> = match config.dify.clone() {
        Some(dify) => Some(Arc::new(DifyClient::new(dify)?)),
        None => None,
    };

    let state = AppState::new(config.clone(), db, index);
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("brokerkb-api listening on {}", config.bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
