use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::model::{Job, JobId};
use crate::common::error::EncodeError;
use crate::config::settings::AppConfig;
use crate::infrastructure::ffmpeg::command::ToolCommand;
use crate::infrastructure::ffmpeg::probe::{self, SourceInfo};

const MAXIMUM_BITRATE_720P: u64 = 5_000_000;
const MAXIMUM_BITRATE_1080P: u64 = 8_000_000;
const MAXIMUM_BITRATE_1440P: u64 = 16_000_000;

pub const MASTER_PLAYLIST: &str = "master.m3u8";

/// Turns one source video into an HLS stream set.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, job: &Job) -> Result<(), EncodeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rendition {
    pub width: u32,
    pub height: u32,
    pub bit_rate: u64,
}

/// Output width for `height`, keeping the source aspect ratio. x264 needs
/// even dimensions.
fn scaled_width(height: u32, source: &SourceInfo) -> u32 {
    let exact = (u64::from(height) * u64::from(source.width)) as f64 / f64::from(source.height);
    let width = exact.round() as u32;
    if width % 2 == 0 { width } else { width + 1 }
}

fn rendition(height: u32, cap: u64, source: &SourceInfo) -> Rendition {
    Rendition {
        width: scaled_width(height, source),
        height,
        bit_rate: source.bit_rate.min(cap),
    }
}

/// The bitrate ladder for a source: always a 720p stream, plus 1080p and
/// 1440p (or the original resolution) when the source is tall enough.
pub fn plan_renditions(source: &SourceInfo) -> Vec<Rendition> {
    let mut ladder = vec![rendition(720, MAXIMUM_BITRATE_720P, source)];

    if source.height > 720 {
        ladder.push(rendition(1080, MAXIMUM_BITRATE_1080P, source));
    }

    if source.height > 1440 {
        ladder.push(Rendition {
            width: scaled_width(source.height, source),
            height: source.height,
            bit_rate: source.bit_rate,
        });
    } else if source.height > 1080 {
        ladder.push(rendition(1440, MAXIMUM_BITRATE_1440P, source));
    }

    ladder
}

#[derive(Debug, Clone)]
pub struct HlsSettings {
    pub preset: String,
    pub segment_seconds: u32,
}

impl Default for HlsSettings {
    fn default() -> Self {
        Self {
            preset: "veryslow".to_string(),
            segment_seconds: 6,
        }
    }
}

pub fn build_hls_args(
    input: &Path,
    output_dir: &Path,
    renditions: &[Rendition],
    has_audio: bool,
    settings: &HlsSettings,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-preset".into(),
        settings.preset.clone(),
        "-g".into(),
        "48".into(),
        "-crf".into(),
        "17".into(),
        "-sc_threshold".into(),
        "0".into(),
    ];

    for _ in renditions {
        args.extend(["-map".to_string(), "0:0".to_string()]);
        if has_audio {
            args.extend(["-map".to_string(), "0:1".to_string()]);
        }
    }

    for (i, r) in renditions.iter().enumerate() {
        args.extend([
            format!("-s:v:{i}"),
            format!("{}x{}", r.width, r.height),
            format!("-c:v:{i}"),
            "libx264".into(),
            format!("-b:v:{i}"),
            r.bit_rate.to_string(),
        ]);
    }

    let stream_map = (0..renditions.len())
        .map(|i| {
            if has_audio {
                format!("v:{i},a:{i}")
            } else {
                format!("v:{i}")
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    args.extend([
        "-c:a".into(),
        "copy".into(),
        "-var_stream_map".into(),
        stream_map,
        "-master_pl_name".into(),
        MASTER_PLAYLIST.into(),
        "-f".into(),
        "hls".into(),
        "-hls_time".into(),
        settings.segment_seconds.to_string(),
        "-hls_list_size".into(),
        "0".into(),
        "-hls_segment_filename".into(),
        output_dir
            .join("v%v")
            .join("fileSequence%d.ts")
            .to_string_lossy()
            .into_owned(),
        output_dir
            .join("v%v")
            .join("prog_index.m3u8")
            .to_string_lossy()
            .into_owned(),
    ]);

    args
}

/// Encodes with ffmpeg into `<output_root>/<job id>/`.
#[derive(Debug, Clone)]
pub struct HlsEncoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    output_root: PathBuf,
    timeout: Duration,
    settings: HlsSettings,
}

impl HlsEncoder {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
            output_root: config.hls_output_dir.clone(),
            timeout: config.encode_timeout(),
            settings: HlsSettings {
                preset: config.encode_preset.clone(),
                segment_seconds: config.hls_segment_seconds,
            },
        }
    }

    pub fn output_dir(&self, id: &JobId) -> PathBuf {
        self.output_root.join(id.as_str())
    }
}

#[async_trait]
impl Encoder for HlsEncoder {
    async fn encode(&self, job: &Job) -> Result<(), EncodeError> {
        let source = probe::probe(&self.ffprobe, &job.source_path).await?;
        let renditions = plan_renditions(&source);
        let output_dir = self.output_dir(&job.id);

        info!(
            job_id = %job.id,
            width = source.width,
            height = source.height,
            bit_rate = source.bit_rate,
            has_audio = source.has_audio,
            renditions = renditions.len(),
            "Encoding HLS stream set"
        );

        tokio::fs::create_dir_all(&output_dir).await?;

        let args = build_hls_args(
            &job.source_path,
            &output_dir,
            &renditions,
            source.has_audio,
            &self.settings,
        );
        let output = ToolCommand::new(&self.ffmpeg)
            .args(args)
            .timeout(self.timeout)
            .execute()
            .await?;

        debug!(job_id = %job.id, stderr_bytes = output.stderr.len(), "ffmpeg finished");
        Ok(())
    }
}
