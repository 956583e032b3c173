use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::common::error::ConfigError;
use crate::config::env::{self, EnvKey};

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub video_status_table: String,
    pub hls_output_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub encode_preset: String,
    pub hls_segment_seconds: u32,
    pub encode_timeout_secs: u64,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        // Postgres folds unquoted identifiers; pg_indexes lookups see the folded name.
        let video_status_table =
            env::get_or(EnvKey::VideoStatusTable, "video_status").to_ascii_lowercase();
        validate_table_name(&video_status_table)?;

        Ok(Self {
            database_url: env::get(EnvKey::DatabaseUrl)
                .map_err(|e| ConfigError::Missing(EnvKey::DatabaseUrl.as_str(), e))?,
            db_max_connections: env::get_parsed(EnvKey::DbMaxConnections, 20),
            video_status_table,
            hls_output_dir: PathBuf::from(env::get_or(EnvKey::HlsOutputDir, "uploads/videos")),
            ffmpeg_path: PathBuf::from(env::get_or(EnvKey::FfmpegPath, "ffmpeg")),
            ffprobe_path: PathBuf::from(env::get_or(EnvKey::FfprobePath, "ffprobe")),
            encode_preset: env::get_or(EnvKey::EncodePreset, "veryslow"),
            hls_segment_seconds: env::get_parsed(EnvKey::HlsSegmentSeconds, 6),
            encode_timeout_secs: env::get_parsed(EnvKey::EncodeTimeoutSecs, 3600),
        })
    }

    pub fn encode_timeout(&self) -> Duration {
        Duration::from_secs(self.encode_timeout_secs)
    }
}

/// The status table name is spliced into SQL text, so only plain identifiers
/// are accepted.
pub fn validate_table_name(name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && name.len() <= 63 {
        Ok(())
    } else {
        Err(ConfigError::InvalidTableName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        assert!(validate_table_name("video_status").is_ok());
        assert!(validate_table_name("_staging2").is_ok());
    }

    #[test]
    fn rejects_names_that_are_not_identifiers() {
        for name in ["", "2fast", "video-status", "video_status; DROP TABLE x", "a b"] {
            assert!(
                matches!(validate_table_name(name), Err(ConfigError::InvalidTableName(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_names_longer_than_postgres_allows() {
        let name = "t".repeat(64);
        assert!(validate_table_name(&name).is_err());
    }
}
