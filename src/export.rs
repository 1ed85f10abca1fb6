//! Export of buffered annotated frames into a video container.
//!
//! A pure drain: raw RGB24 frames are piped in buffer order into one ffmpeg
//! encode process at the session's recorded frame rate. The caller must only
//! pass a buffer from a terminal session report.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{StrideError, StrideResult};
use crate::ffmpeg::ffmpeg_path;
use crate::frame::Frame;

/// Output codec, tied to the chosen container extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Lossless FFV1 in Matroska.
    Ffv1,
    /// XVID-tagged MPEG-4 in AVI.
    Xvid,
    /// H.264 in MP4.
    H264,
}

impl Codec {
    /// Pick the codec for an output path by extension.
    pub fn for_extension(path: &Path) -> Option<Codec> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("mkv") => Some(Codec::Ffv1),
            Some("avi") => Some(Codec::Xvid),
            Some("mp4") => Some(Codec::H264),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Codec::Ffv1 => "FFV1",
            Codec::Xvid => "XVID",
            Codec::H264 => "H264",
        }
    }

    /// Encoder arguments for this codec.
    fn encoder_args(&self) -> Vec<String> {
        let args: &[&str] = match self {
            Codec::Ffv1 => &["-c:v", "ffv1", "-level", "3"],
            // Stock ffmpeg builds lack libxvid; mpeg4 with an XVID fourcc
            // produces the same container contract.
            Codec::Xvid => &["-c:v", "mpeg4", "-vtag", "XVID", "-qscale:v", "3"],
            Codec::H264 => &["-c:v", "libx264", "-crf", "18", "-preset", "medium"],
        };
        args.iter().map(|s| s.to_string()).collect()
    }
}

/// Result of a successful export.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub output_path: PathBuf,
    pub frames_written: usize,
    pub file_size_bytes: u64,
    pub duration_secs: f64,
}

/// Build the full ffmpeg argument list for encoding raw RGB24 from stdin.
pub fn build_encoder_args(
    codec: Codec,
    width: u32,
    height: u32,
    fps: f64,
    output_path: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgb24",
        "-s",
        &format!("{}x{}", width, height),
        "-r",
        &format!("{:.3}", fps),
        "-i",
        "-",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.extend(codec.encoder_args());

    if codec == Codec::H264 {
        // x264 wants even dimensions and players want yuv420p + faststart.
        args.extend(
            [
                "-vf",
                "crop=trunc(iw/2)*2:trunc(ih/2)*2",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
    }

    args.push(output_path.to_string_lossy().to_string());
    args
}

/// Write `frames` to `output_path` at `fps`.
///
/// Fails if the buffer is empty or the destination cannot be opened for the
/// chosen codec/container. Frames are written untouched, in order.
pub fn export_video(
    frames: &[Frame],
    output_path: &Path,
    codec: Codec,
    fps: f64,
) -> StrideResult<ExportSummary> {
    if frames.is_empty() {
        return Err(StrideError::Export("no frames processed".to_string()));
    }

    let (width, height) = (frames[0].width, frames[0].height);
    let fps = if fps > 0.0 { fps } else { 30.0 };

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StrideError::Export(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
    }

    let args = build_encoder_args(codec, width, height, fps, output_path);
    log::info!("[EXPORT] ffmpeg {}", args.join(" "));

    let mut process = Command::new(ffmpeg_path())
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| StrideError::Export(format!("failed to start ffmpeg: {}", e)))?;

    let mut stdin = process
        .stdin
        .take()
        .ok_or_else(|| StrideError::Export("no ffmpeg stdin".to_string()))?;

    let mut written = 0usize;
    let mut pipe_error = None;
    for (i, frame) in frames.iter().enumerate() {
        if frame.width != width || frame.height != height {
            pipe_error = Some(format!(
                "frame {} is {}x{}, expected {}x{}",
                i, frame.width, frame.height, width, height
            ));
            break;
        }
        if let Err(e) = stdin.write_all(&frame.data) {
            pipe_error = Some(format!("write failed at frame {}: {}", i, e));
            break;
        }
        written += 1;
    }

    // Close stdin to signal end of input, then collect the encoder result.
    drop(stdin);
    let mut stderr = String::new();
    if let Some(mut pipe) = process.stderr.take() {
        let _ = pipe.read_to_string(&mut stderr);
    }
    let status = process
        .wait()
        .map_err(|e| StrideError::Export(format!("ffmpeg wait failed: {}", e)))?;

    if let Some(reason) = pipe_error {
        return Err(StrideError::Export(reason));
    }
    if !status.success() {
        return Err(StrideError::Export(format!(
            "cannot write {}: {}",
            output_path.display(),
            stderr.lines().last().unwrap_or("ffmpeg failed")
        )));
    }

    let file_size_bytes = std::fs::metadata(output_path).map(|m| m.len()).unwrap_or(0);
    let summary = ExportSummary {
        output_path: output_path.to_path_buf(),
        frames_written: written,
        file_size_bytes,
        duration_secs: written as f64 / fps,
    };
    log::info!(
        "[EXPORT] Saved {} frames ({} bytes) to {}",
        summary.frames_written,
        summary.file_size_bytes,
        summary.output_path.display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_for_extension() {
        assert_eq!(Codec::for_extension(Path::new("out.mkv")), Some(Codec::Ffv1));
        assert_eq!(Codec::for_extension(Path::new("out.avi")), Some(Codec::Xvid));
        assert_eq!(Codec::for_extension(Path::new("out.MP4")), Some(Codec::H264));
        assert_eq!(Codec::for_extension(Path::new("out.webm")), None);
        assert_eq!(Codec::for_extension(Path::new("noext")), None);
    }

    #[test]
    fn test_empty_buffer_fails_without_spawning() {
        let err = export_video(&[], Path::new("out.mkv"), Codec::Ffv1, 30.0);
        match err {
            Err(StrideError::Export(msg)) => assert_eq!(msg, "no frames processed"),
            other => panic!("expected ExportError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_encoder_args_rawvideo_input() {
        let args = build_encoder_args(Codec::Ffv1, 320, 240, 29.97, Path::new("out.mkv"));
        let joined = args.join(" ");
        assert!(joined.starts_with("-y -f rawvideo -pix_fmt rgb24 -s 320x240 -r 29.970 -i -"));
        assert!(joined.contains("-c:v ffv1"));
        assert!(joined.ends_with("out.mkv"));
    }

    #[test]
    fn test_encoder_args_xvid_fourcc() {
        let args = build_encoder_args(Codec::Xvid, 640, 480, 30.0, Path::new("out.avi"));
        let joined = args.join(" ");
        assert!(joined.contains("-c:v mpeg4 -vtag XVID"));
        assert!(!joined.contains("yuv420p"));
    }

    #[test]
    fn test_encoder_args_h264_pixel_format() {
        let args = build_encoder_args(Codec::H264, 641, 480, 30.0, Path::new("out.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert!(joined.contains("+faststart"));
        assert!(joined.contains("crop=trunc(iw/2)*2"));
    }
}
