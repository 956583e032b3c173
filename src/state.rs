use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::modules::media::repository::StatusStore;
use crate::workers::transcoder::EncodeQueue;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub status: Arc<dyn StatusStore>,
    pub queue: EncodeQueue,
}

impl AppState {
    pub fn new(config: AppConfig, status: Arc<dyn StatusStore>, queue: EncodeQueue) -> Self {
        Self {
            config,
            status,
            queue,
        }
    }
}
