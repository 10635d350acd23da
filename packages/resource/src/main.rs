use std::sync::Arc;

use anyhow::Context;
use common::storage::filesystem::FilesystemBlobStore;
use converter::ProcessConverter;
use resource::config::AppConfig;
use resource::database::init_db;
use resource::{ConversionScheduler, DbFileRecordRepository, ResourceService};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::load().context("Failed to load config")?;

    let db = init_db(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to initialize database")?;
    info!("Database connected");

    let blobs = Arc::new(
        FilesystemBlobStore::new(config.storage.path.clone(), config.storage.max_blob_size)
            .await
            .context("Failed to initialize blob store")?,
    );
    info!(path = %config.storage.path.display(), "Blob store ready");

    let repository = Arc::new(DbFileRecordRepository::new(db));
    let service = ResourceService::new(repository.clone(), blobs.clone());

    if config.startup.resave_all {
        let report = service
            .resave_all()
            .await
            .context("Failed to re-save stored files")?;
        info!(
            resaved = report.resaved,
            skipped = report.skipped,
            failed = report.failed,
            "Startup re-save complete"
        );
    }

    let shutdown = CancellationToken::new();
    let scheduler = if config.scheduler.enabled {
        let converter = Arc::new(ProcessConverter::from_config(&config.conversion));
        info!(binary = %config.conversion.binary_path, "Converter configured");
        let scheduler = Arc::new(ConversionScheduler::new(
            repository,
            blobs,
            converter,
            config.scheduler.clone(),
        ));
        Some(scheduler.spawn(shutdown.clone()))
    } else {
        info!("Conversion scheduler disabled");
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");

    shutdown.cancel();
    if let Some(handle) = scheduler {
        handle.await.context("Conversion scheduler panicked")?;
    }

    Ok(())
}
