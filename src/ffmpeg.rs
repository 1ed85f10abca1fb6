//! FFmpeg/ffprobe binary discovery and stream probing.
//!
//! Decode and encode both run through subprocesses, so the only thing this
//! module owns is finding the binaries (bundled sidecar first, PATH second)
//! and reading stream metadata up front.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use crate::error::{StrideError, StrideResult};

/// Resolve the ffmpeg binary: sidecar download dir, then PATH.
pub fn ffmpeg_path() -> PathBuf {
    let sidecar = ffmpeg_sidecar::paths::ffmpeg_path();
    if sidecar.is_file() {
        sidecar
    } else {
        PathBuf::from("ffmpeg")
    }
}

/// Resolve the ffprobe binary (next to the sidecar ffmpeg, or PATH).
pub fn ffprobe_path() -> PathBuf {
    let sidecar = ffmpeg_sidecar::ffprobe::ffprobe_path();
    if sidecar.is_file() {
        sidecar
    } else {
        PathBuf::from("ffprobe")
    }
}

/// Video stream metadata extracted from ffprobe.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Total frames; estimated from duration when the container omits it.
    pub frame_count: Option<u64>,
    pub duration_ms: u64,
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Extract metadata from a video file using ffprobe.
pub fn probe_video(path: &Path, fallback_fps: f64) -> StrideResult<VideoMetadata> {
    let output = Command::new(ffprobe_path())
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,nb_frames",
            "-show_entries",
            "format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| StrideError::Probe(format!("failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(StrideError::Probe(format!(
            "ffprobe failed for {}: {}",
            path.display(),
            stderr.trim()
        )));
    }

    parse_probe_json(&String::from_utf8_lossy(&output.stdout), fallback_fps)
}

/// Parse ffprobe JSON into metadata. Split out for testing.
pub fn parse_probe_json(raw: &str, fallback_fps: f64) -> StrideResult<VideoMetadata> {
    let probe: ProbeOutput = serde_json::from_str(raw)
        .map_err(|e| StrideError::Probe(format!("unreadable ffprobe output: {}", e)))?;

    let stream = probe
        .streams
        .first()
        .ok_or_else(|| StrideError::Probe("no video stream found".to_string()))?;

    let width = stream
        .width
        .ok_or_else(|| StrideError::Probe("stream has no width".to_string()))?;
    let height = stream
        .height
        .ok_or_else(|| StrideError::Probe("stream has no height".to_string()))?;

    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .filter(|f| *f > 0.0)
        .unwrap_or(fallback_fps);

    let duration_secs = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);
    let duration_ms = (duration_secs * 1000.0).round() as u64;

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .or_else(|| {
            if duration_secs > 0.0 {
                Some((duration_secs * fps).round() as u64)
            } else {
                None
            }
        });

    Ok(VideoMetadata {
        width,
        height,
        fps,
        frame_count,
        duration_ms,
    })
}

/// Parse a rational rate like `30000/1001` or a plain number.
fn parse_rate(raw: &str) -> Option<f64> {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                None
            } else {
                Some(num / den)
            }
        }
        None => raw.trim().parse().ok(),
    }
}
