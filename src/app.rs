use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::{DbPool, connect_to_db};
use crate::modules::media::encoder::HlsEncoder;
use crate::modules::media::repository::PgStatusStore;
use crate::state::AppState;
use crate::workers::transcoder::EncodeQueue;

pub async fn connect_status_store(config: &AppConfig) -> Result<PgStatusStore> {
    let db: DbPool = connect_to_db(config)
        .await
        .context("Failed to connect to PostgreSQL")?;

    let store = PgStatusStore::new(db, &config.video_status_table);
    store
        .ensure_schema()
        .await
        .context("Failed to prepare video status table")?;
    Ok(store)
}

pub async fn init_folders(config: &AppConfig) -> Result<()> {
    tokio::fs::create_dir_all(&config.hls_output_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.hls_output_dir.display()))
}

/// Connects the status store and starts the transcoder worker.
pub async fn create_app(config: AppConfig) -> Result<(AppState, JoinHandle<()>)> {
    init_folders(&config).await?;
    let store = Arc::new(connect_status_store(&config).await?);
    let encoder = Arc::new(HlsEncoder::from_config(&config));

    let (queue, worker) = EncodeQueue::spawn(store.clone(), encoder);
    info!(hls_dir = %config.hls_output_dir.display(), "Encode queue ready");

    Ok((AppState::new(config, store, queue), worker))
}
