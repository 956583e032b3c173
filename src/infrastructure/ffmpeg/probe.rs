use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::command::ToolCommand;
use crate::common::error::EncodeError;

const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// What the encoder needs to know about a source video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Bits per second.
    pub bit_rate: u64,
    pub has_audio: bool,
}

pub async fn probe(ffprobe: &Path, input: &Path) -> Result<SourceInfo, EncodeError> {
    let output = ToolCommand::new(ffprobe)
        .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(input.to_string_lossy())
        .timeout(PROBE_TIMEOUT)
        .execute()
        .await?;

    parse_probe_output(&output.stdout)
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    bit_rate: Option<String>,
}

pub fn parse_probe_output(json: &str) -> Result<SourceInfo, EncodeError> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| EncodeError::Probe(format!("ffprobe JSON parse error: {e}")))?;

    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| EncodeError::Probe("no video stream".to_string()))?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(EncodeError::Probe("video stream has no dimensions".to_string())),
    };

    // Matroska and some mp4 muxers only report the overall rate.
    let bit_rate = parse_bit_rate(video.bit_rate.as_deref())
        .or_else(|| parse_bit_rate(output.format.bit_rate.as_deref()))
        .ok_or_else(|| EncodeError::Probe("unknown bit rate".to_string()))?;

    let has_audio = output
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(SourceInfo {
        width,
        height,
        bit_rate,
        has_audio,
    })
}

fn parse_bit_rate(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.parse::<u64>().ok()).filter(|&b| b > 0)
}
