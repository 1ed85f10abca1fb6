//! Capture sources: bounded video files and unbounded live cameras.

mod camera;
mod file;

pub use camera::CameraSource;
pub use file::FileSource;

use crate::error::StrideResult;
use crate::frame::Frame;

/// Result of a single read from a capture source.
///
/// `Again` is the live-source transient failure: no frame right now, retry
/// after a short delay. Bounded sources never return it; they end with
/// `EndOfStream`.
#[derive(Debug)]
pub enum ReadOutcome {
    Frame(Frame),
    EndOfStream,
    Again,
}

/// A finite (file) or unbounded (camera) sequence of frames.
///
/// Implementations own the underlying handle exclusively; only one of the
/// transport controller or the processing loop may hold a source at a time,
/// which ownership enforces.
pub trait CaptureSource: Send {
    /// Read the next frame.
    fn read(&mut self) -> StrideResult<ReadOutcome>;

    /// Jump to an absolute frame index. Bounded sources only; unbounded
    /// sources fail with `SeekUnsupported`.
    fn seek(&mut self, frame_index: u64) -> StrideResult<()>;

    /// Total frames, `None` when unbounded.
    fn frame_count(&self) -> Option<u64>;

    /// Frames per second; best-effort for live sources.
    fn frame_rate(&self) -> f64;

    /// (width, height) of produced frames.
    fn dimensions(&self) -> (u32, u32);

    fn is_live(&self) -> bool {
        self.frame_count().is_none()
    }

    /// Release the underlying device/file handle. Idempotent.
    fn release(&mut self);
}
