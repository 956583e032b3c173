use std::path::PathBuf;
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::common::error::QueueError;
use crate::modules::media::encoder::Encoder;
use crate::modules::media::model::{EncodeStatus, Job, JobId};
use crate::modules::media::repository::StatusStore;

/// Handle to the HLS encode backlog.
///
/// Jobs are encoded one at a time, in the order they were enqueued, by the
/// single worker task spawned in [`EncodeQueue::spawn`]. Cloning the handle
/// shares the same backlog.
#[derive(Clone)]
pub struct EncodeQueue {
    sender: Sender<Job>,
    store: Arc<dyn StatusStore>,
    // Held shared by `enqueue` from the closed check to the send; `close`
    // takes it exclusively.
    open: Arc<RwLock<()>>,
}

impl EncodeQueue {
    pub fn spawn(
        store: Arc<dyn StatusStore>,
        encoder: Arc<dyn Encoder>,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = async_channel::unbounded();
        let worker = tokio::spawn(start_transcoder_worker(receiver, store.clone(), encoder));
        let queue = Self {
            sender,
            store,
            open: Arc::new(RwLock::new(())),
        };
        (queue, worker)
    }

    /// Queue a video for encoding and return its job id without waiting for
    /// the encode.
    ///
    /// The path must point at an existing file; otherwise nothing is recorded.
    pub async fn enqueue(&self, source_path: impl Into<PathBuf>) -> Result<JobId, QueueError> {
        let source_path = source_path.into();

        let is_file = tokio::fs::metadata(&source_path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(QueueError::InvalidPath(source_path));
        }

        let job = Job::from_path(source_path)?;
        let _open = self.open.read().await;
        if self.sender.is_closed() {
            return Err(QueueError::Closed);
        }

        self.store.insert_pending(&job.id).await?;

        let id = job.id.clone();
        self.sender.send(job).await.map_err(|_| QueueError::Closed)?;
        info!(job_id = %id, backlog = self.sender.len(), "Queued video for HLS encoding");
        Ok(id)
    }

    /// Jobs waiting behind the one currently encoding.
    pub fn pending(&self) -> usize {
        self.sender.len()
    }

    /// Stop accepting jobs. Already queued jobs are still encoded; the worker
    /// exits once the backlog is empty.
    ///
    /// Waits for enqueues that already wrote their `pending` record, so every
    /// recorded job is queued.
    pub async fn close(&self) {
        let _closing = self.open.write().await;
        self.sender.close();
    }
}

pub async fn start_transcoder_worker(
    receiver: Receiver<Job>,
    store: Arc<dyn StatusStore>,
    encoder: Arc<dyn Encoder>,
) {
    info!("🎥 Transcoder worker started");

    while let Ok(job) = receiver.recv().await {
        process_job(store.as_ref(), encoder.as_ref(), &job).await;

        if receiver.is_empty() {
            info!("Encode video queue is empty");
        }
    }

    info!("🎥 Transcoder worker stopped");
}

async fn process_job(store: &dyn StatusStore, encoder: &dyn Encoder, job: &Job) {
    info!(job_id = %job.id, path = %job.source_path.display(), "Processing encode job");

    let mut processing = mark_processing(store, job).await;
    let encoded = encoder.encode(job).await;

    if !processing {
        warn!(job_id = %job.id, "Retrying processing status before recording the outcome");
        processing = mark_processing(store, job).await;
    }
    if !processing {
        // Record is still `pending`, so the source must stay.
        error!(job_id = %job.id, "Encode outcome not recorded, keeping source file");
        return;
    }

    let outcome = match encoded {
        Ok(()) => tokio::fs::remove_file(&job.source_path)
            .await
            .map_err(|e| format!("encoded, but failed to delete source file: {e}")),
        Err(e) => Err(e.to_string()),
    };

    match outcome {
        Ok(()) => {
            if let Err(e) = store.transition(&job.id, EncodeStatus::Success, None).await {
                error!(job_id = %job.id, "Failed to mark video as encoded: {}", e);
            }
            info!(job_id = %job.id, "✅ Encoded video successfully");
        }
        Err(message) => {
            warn!(job_id = %job.id, "❌ Encode failed: {}", message);
            if let Err(e) = store
                .transition(&job.id, EncodeStatus::Failed, Some(&message))
                .await
            {
                error!(job_id = %job.id, "Failed to mark video as failed: {}", e);
            }
        }
    }
}

async fn mark_processing(store: &dyn StatusStore, job: &Job) -> bool {
    match store
        .transition(&job.id, EncodeStatus::Processing, None)
        .await
    {
        Ok(()) => true,
        Err(e) => {
            error!(job_id = %job.id, "Failed to mark video as processing: {}", e);
            false
        }
    }
}
