//! Bounded file source backed by a streaming ffmpeg decode process.
//!
//! One ffmpeg process per playback position: it emits continuous raw RGB24
//! frames on stdout and `read` consumes exactly one frame per call. Seeking
//! restarts the process at the target timestamp.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::error::{StrideError, StrideResult};
use crate::ffmpeg::{ffmpeg_path, probe_video, VideoMetadata};
use crate::frame::Frame;

use super::{CaptureSource, ReadOutcome};

pub struct FileSource {
    path: PathBuf,
    meta: VideoMetadata,
    total_frames: u64,
    frame_size: usize,
    process: Option<Child>,
    stdout: Option<ChildStdout>,
    /// Index of the frame the next `read` returns.
    next_frame: u64,
}

impl FileSource {
    /// Probe the file and start decoding at frame 0.
    pub fn open(path: &Path, fallback_fps: f64) -> StrideResult<Self> {
        if !path.is_file() {
            return Err(StrideError::SourceOpen(format!(
                "{} does not exist",
                path.display()
            )));
        }
        let meta = probe_video(path, fallback_fps)
            .map_err(|e| StrideError::SourceOpen(e.to_string()))?;
        let total_frames = meta.frame_count.ok_or_else(|| {
            StrideError::SourceOpen(format!(
                "{}: cannot determine stream length",
                path.display()
            ))
        })?;
        let frame_size = Frame::byte_len(meta.width, meta.height);

        log::info!(
            "[CAPTURE] Opened {}: {}x{} @ {:.2}fps, {} frames",
            path.display(),
            meta.width,
            meta.height,
            meta.fps,
            total_frames
        );

        let mut source = Self {
            path: path.to_path_buf(),
            meta,
            total_frames,
            frame_size,
            process: None,
            stdout: None,
            next_frame: 0,
        };
        source.spawn_at(0)?;
        Ok(source)
    }

    /// (Re)start the decode process positioned at `frame_index`.
    fn spawn_at(&mut self, frame_index: u64) -> StrideResult<()> {
        self.kill_process();

        let start_secs = frame_index as f64 / self.meta.fps.max(1.0);
        let mut process = Command::new(ffmpeg_path())
            .args([
                "-v",
                "error",
                "-ss",
                &format!("{:.4}", start_secs),
                "-i",
            ])
            .arg(&self.path)
            .args([
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s",
                &format!("{}x{}", self.meta.width, self.meta.height),
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| StrideError::SourceOpen(format!("failed to start ffmpeg: {}", e)))?;

        self.stdout = process.stdout.take();
        self.process = Some(process);
        self.next_frame = frame_index;
        Ok(())
    }

    fn kill_process(&mut self) {
        self.stdout = None;
        if let Some(mut process) = self.process.take() {
            let _ = process.kill();
            let _ = process.wait();
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.meta
    }

    /// Index of the frame the next `read` will return.
    pub fn position(&self) -> u64 {
        self.next_frame
    }
}

impl CaptureSource for FileSource {
    fn read(&mut self) -> StrideResult<ReadOutcome> {
        let stdout = match self.stdout.as_mut() {
            Some(stdout) => stdout,
            None => return Ok(ReadOutcome::EndOfStream),
        };

        let mut buffer = vec![0u8; self.frame_size];
        match stdout.read_exact(&mut buffer) {
            Ok(()) => {
                let frame_number = self.next_frame;
                let timestamp_ms = ((frame_number as f64 / self.meta.fps.max(1.0)) * 1000.0) as u64;
                self.next_frame += 1;
                Ok(ReadOutcome::Frame(Frame {
                    data: buffer,
                    width: self.meta.width,
                    height: self.meta.height,
                    frame_number,
                    timestamp_ms,
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Ok(ReadOutcome::EndOfStream)
            }
            Err(e) => Err(StrideError::Io(e)),
        }
    }

    fn seek(&mut self, frame_index: u64) -> StrideResult<()> {
        let clamped = frame_index.min(self.total_frames.saturating_sub(1));
        self.spawn_at(clamped)
    }

    fn frame_count(&self) -> Option<u64> {
        Some(self.total_frames)
    }

    fn frame_rate(&self) -> f64 {
        self.meta.fps
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.meta.width, self.meta.height)
    }

    fn release(&mut self) {
        self.kill_process();
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        self.kill_process();
    }
}
