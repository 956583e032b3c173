//! In-memory collaborators for exercising the encode queue without Postgres
//! or ffmpeg.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::model::{EncodeStatus, JobId, VideoStatus};
use super::repository::StatusStore;
use crate::common::error::StatusError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub name: String,
    pub status: EncodeStatus,
    pub at: OffsetDateTime,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, VideoStatus>,
    history: Vec<Transition>,
    fail_next: HashMap<(String, EncodeStatus), usize>,
}

#[derive(Default)]
pub struct MemoryStatusStore {
    inner: Mutex<Inner>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<VideoStatus> {
        self.inner.lock().unwrap().records.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    /// Every accepted write in the order it happened, `pending` inserts
    /// included.
    pub fn history(&self) -> Vec<Transition> {
        self.inner.lock().unwrap().history.clone()
    }

    pub fn history_for(&self, name: &str) -> Vec<EncodeStatus> {
        self.history()
            .into_iter()
            .filter(|t| t.name == name)
            .map(|t| t.status)
            .collect()
    }

    pub fn count_in(&self, status: EncodeStatus) -> usize {
        self.inner
            .lock()
            .unwrap()
            .records
            .values()
            .filter(|r| r.status == status)
            .count()
    }

    /// Make the next write of `status` for `name` fail as if the database
    /// were unreachable.
    pub fn fail_next_write(&self, name: &str, status: EncodeStatus) {
        *self
            .inner
            .lock()
            .unwrap()
            .fail_next
            .entry((name.to_string(), status))
            .or_default() += 1;
    }
}

fn take_injected_failure(inner: &mut Inner, name: &str, status: EncodeStatus) -> bool {
    match inner.fail_next.get_mut(&(name.to_string(), status)) {
        Some(n) if *n > 0 => {
            *n -= 1;
            true
        }
        _ => false,
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn insert_pending(&self, name: &JobId) -> Result<VideoStatus, StatusError> {
        let mut inner = self.inner.lock().unwrap();
        if take_injected_failure(&mut inner, name.as_str(), EncodeStatus::Pending) {
            return Err(StatusError::Database(sqlx::Error::PoolTimedOut));
        }
        if inner.records.contains_key(name.as_str()) {
            return Err(StatusError::Duplicate(name.to_string()));
        }

        let record = VideoStatus::pending(name);
        inner.history.push(Transition {
            name: record.name.clone(),
            status: record.status,
            at: record.updated_at,
        });
        inner.records.insert(record.name.clone(), record.clone());
        Ok(record)
    }

    async fn transition(
        &self,
        name: &JobId,
        next: EncodeStatus,
        message: Option<&str>,
    ) -> Result<(), StatusError> {
        let mut inner = self.inner.lock().unwrap();
        if take_injected_failure(&mut inner, name.as_str(), next) {
            return Err(StatusError::Database(sqlx::Error::PoolTimedOut));
        }

        let record = inner
            .records
            .get_mut(name.as_str())
            .ok_or_else(|| StatusError::NotFound(name.to_string()))?;
        if !record.status.can_transition_to(next) {
            return Err(StatusError::InvalidTransition {
                name: name.to_string(),
                from: record.status,
                to: next,
            });
        }

        record.status = next;
        record.message = message.unwrap_or_default().to_string();
        record.updated_at = OffsetDateTime::now_utc();
        let transition = Transition {
            name: record.name.clone(),
            status: next,
            at: record.updated_at,
        };
        inner.history.push(transition);
        Ok(())
    }

    async fn find(&self, name: &str) -> Result<Option<VideoStatus>, StatusError> {
        Ok(self.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::media::model::derive_job_id;
    use std::path::Path;

    fn id(name: &str) -> JobId {
        derive_job_id(Path::new(name)).unwrap()
    }

    #[tokio::test]
    async fn rejects_duplicate_names() {
        let store = MemoryStatusStore::new();
        store.insert_pending(&id("a.mp4")).await.unwrap();

        let err = store.insert_pending(&id("a.mov")).await.unwrap_err();
        assert!(matches!(err, StatusError::Duplicate(name) if name == "a"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn refuses_skipping_processing() {
        let store = MemoryStatusStore::new();
        let a = id("a.mp4");
        store.insert_pending(&a).await.unwrap();

        let err = store
            .transition(&a, EncodeStatus::Success, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StatusError::InvalidTransition {
                from: EncodeStatus::Pending,
                to: EncodeStatus::Success,
                ..
            }
        ));
        assert_eq!(store.get("a").unwrap().status, EncodeStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_name_is_not_found() {
        let store = MemoryStatusStore::new();
        let err = store
            .transition(&id("ghost.mp4"), EncodeStatus::Processing, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StatusError::NotFound(_)));
    }
}
