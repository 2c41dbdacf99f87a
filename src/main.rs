use std::sync::Arc;

use log::info;
use profile_assets_s3::S3AssetStore;
use profile_persistence_mongo::{connect_database, profile::ProfileRepositoryImpl};
use profile_server_app::build_application;

mod logs;

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received. Preparing graceful exit...");
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("No .env file loaded: {}", e);
    }

    logs::init_logger();

    let database = connect_database().await;
    let profile_repo = Arc::new(ProfileRepositoryImpl::new(&database).await);
    let asset_store = Arc::new(S3AssetStore::new().await);

    let app = Arc::new(build_application(profile_repo, asset_store));

    info!("Starting application");

    let http_app = tokio::spawn(async move {
        profile_server_api::http::run(app, shutdown_signal()).await;
    });

    if let Err(e) = http_app.await {
        log::error!("HTTP API task failed: {}", e);
    }
}
