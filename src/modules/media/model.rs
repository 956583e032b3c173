use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::common::error::{QueueError, StatusError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodeStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl EncodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodeStatus::Pending => "pending",
            EncodeStatus::Processing => "processing",
            EncodeStatus::Success => "success",
            EncodeStatus::Failed => "failed",
        }
    }

    /// The only state a record may be in right before moving to `self`.
    pub fn predecessor(&self) -> Option<EncodeStatus> {
        match self {
            EncodeStatus::Pending => None,
            EncodeStatus::Processing => Some(EncodeStatus::Pending),
            EncodeStatus::Success | EncodeStatus::Failed => Some(EncodeStatus::Processing),
        }
    }

    pub fn can_transition_to(&self, next: EncodeStatus) -> bool {
        next.predecessor() == Some(*self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EncodeStatus::Success | EncodeStatus::Failed)
    }
}

impl fmt::Display for EncodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncodeStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EncodeStatus::Pending),
            "processing" => Ok(EncodeStatus::Processing),
            "success" => Ok(EncodeStatus::Success),
            "failed" => Ok(EncodeStatus::Failed),
            other => Err(StatusError::InvalidStatus(other.to_string())),
        }
    }
}

/// Identifier shared by a queued job and its status record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job id for an uploaded file: its base name without the last extension.
///
/// Uploads are stored as `<id>/<id>.<ext>`, so this recovers the upload id.
/// Two files sharing a base name map to the same id; the status store rejects
/// the second one.
pub fn derive_job_id(path: &Path) -> Result<JobId, QueueError> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(|stem| JobId(stem.to_string()))
        .ok_or_else(|| QueueError::InvalidPath(path.to_path_buf()))
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub source_path: PathBuf,
}

impl Job {
    pub fn from_path(source_path: PathBuf) -> Result<Self, QueueError> {
        let id = derive_job_id(&source_path)?;
        Ok(Self { id, source_path })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoStatus {
    pub id: Uuid,
    pub name: String,
    pub status: EncodeStatus,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl VideoStatus {
    pub fn pending(name: &JobId) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            name: name.as_str().to_string(),
            status: EncodeStatus::Pending,
            message: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

// Stored as TEXT, parsed on the way out.
#[derive(Debug, FromRow)]
pub struct VideoStatusRow {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub message: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<VideoStatusRow> for VideoStatus {
    type Error = StatusError;

    fn try_from(row: VideoStatusRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            status: row.status.parse()?,
            message: row.message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
