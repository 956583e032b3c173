use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod common;
mod config;
mod infrastructure;
mod modules;
mod state;
mod workers;

use cli::{Cli, Commands};
use config::settings::AppConfig;
use modules::media::service::MediaService;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = AppConfig::new()?;

    match cli.command {
        Commands::Enqueue { files } => enqueue(config, files).await,
        Commands::Status { id } => status(config, &id).await,
        Commands::InitDb => {
            app::connect_status_store(&config).await?;
            info!(table = %config.video_status_table, "Video status table is ready");
            Ok(())
        }
    }
}

async fn enqueue(config: AppConfig, files: Vec<PathBuf>) -> Result<()> {
    info!("Starting encode queue...");
    let (state, worker) = app::create_app(config).await?;

    let mut queued = 0;
    for file in files {
        match MediaService::queue_video_hls(&state, file.clone()).await {
            Ok(video) => {
                queued += 1;
                info!(job_id = %video.id, playlist = %video.playlist.display(), "Queued");
            }
            Err(e) => error!(path = %file.display(), "Skipping video: {:#}", e),
        }
    }

    info!(queued, backlog = state.queue.pending(), "Waiting for the encode queue to drain");
    state.queue.close().await;
    worker.await?;
    Ok(())
}

async fn status(config: AppConfig, id: &str) -> Result<()> {
    let store = app::connect_status_store(&config).await?;
    let record = MediaService::get_video_status(&store, id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    if !record.status.is_terminal() {
        info!(id, status = %record.status, "Video is still being encoded");
    }
    Ok(())
}
