use std::path::PathBuf;

use anyhow::{Result, anyhow};
use serde::Serialize;

use super::encoder::MASTER_PLAYLIST;
use super::model::{JobId, VideoStatus};
use super::repository::StatusStore;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct QueuedVideo {
    pub id: JobId,
    /// Where the master playlist will appear once encoding succeeds.
    pub playlist: PathBuf,
}

pub struct MediaService;

impl MediaService {
    pub async fn queue_video_hls(state: &AppState, path: PathBuf) -> Result<QueuedVideo> {
        let id = state.queue.enqueue(path).await?;
        let playlist = state
            .config
            .hls_output_dir
            .join(id.as_str())
            .join(MASTER_PLAYLIST);

        Ok(QueuedVideo { id, playlist })
    }

    pub async fn get_video_status(store: &dyn StatusStore, id: &str) -> Result<VideoStatus> {
        store
            .find(id)
            .await?
            .ok_or(anyhow!("Video status not found"))
    }
}
