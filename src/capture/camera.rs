//! Unbounded live source over a native webcam.

use std::time::Instant;

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

use crate::error::{StrideError, StrideResult};
use crate::frame::Frame;

use super::{CaptureSource, ReadOutcome};

pub struct CameraSource {
    camera: Camera,
    index: u32,
    fps: f64,
    width: u32,
    height: u32,
    opened_at: Instant,
    frames_read: u64,
    released: bool,
}

impl CameraSource {
    /// Open the camera at `index` and start its stream.
    pub fn open(index: u32, fallback_fps: f64) -> StrideResult<Self> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| StrideError::SourceOpen(format!("webcam {}: {}", index, e)))?;
        camera
            .open_stream()
            .map_err(|e| StrideError::SourceOpen(format!("webcam {} stream: {}", index, e)))?;

        let rate = camera.frame_rate();
        let fps = if rate > 0 { rate as f64 } else { fallback_fps };
        let resolution = camera.resolution();

        log::info!(
            "[CAPTURE] Webcam {} opened: {}x{} @ {:.0}fps",
            index,
            resolution.width(),
            resolution.height(),
            fps
        );

        Ok(Self {
            camera,
            index,
            fps,
            width: resolution.width(),
            height: resolution.height(),
            opened_at: Instant::now(),
            frames_read: 0,
            released: false,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl CaptureSource for CameraSource {
    fn read(&mut self) -> StrideResult<ReadOutcome> {
        if self.released {
            return Ok(ReadOutcome::EndOfStream);
        }

        // A failed grab on a live device is transient, not end-of-stream.
        let buffer = match self.camera.frame() {
            Ok(buffer) => buffer,
            Err(e) => {
                log::debug!("[CAPTURE] Webcam {} grab failed: {}", self.index, e);
                return Ok(ReadOutcome::Again);
            }
        };
        let image = match buffer.decode_image::<RgbFormat>() {
            Ok(image) => image,
            Err(e) => {
                log::debug!("[CAPTURE] Webcam {} decode failed: {}", self.index, e);
                return Ok(ReadOutcome::Again);
            }
        };

        let frame_number = self.frames_read;
        self.frames_read += 1;
        let mut frame = Frame::from_rgb_image(
            image,
            frame_number,
            self.opened_at.elapsed().as_millis() as u64,
        );
        // Some drivers renegotiate size mid-stream; keep our reported
        // dimensions in sync with what actually arrived.
        self.width = frame.width;
        self.height = frame.height;
        frame.frame_number = frame_number;
        Ok(ReadOutcome::Frame(frame))
    }

    fn seek(&mut self, _frame_index: u64) -> StrideResult<()> {
        Err(StrideError::SeekUnsupported(format!(
            "webcam {} is a live stream",
            self.index
        )))
    }

    fn frame_count(&self) -> Option<u64> {
        None
    }

    fn frame_rate(&self) -> f64 {
        self.fps
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn release(&mut self) {
        if !self.released {
            if let Err(e) = self.camera.stop_stream() {
                log::warn!("[CAPTURE] Webcam {} stop failed: {}", self.index, e);
            }
            self.released = true;
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}
