//! Test doubles shared across unit tests: an in-memory capture source and
//! scripted annotators.

#![cfg(test)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::annotate::Annotator;
use crate::capture::{CaptureSource, ReadOutcome};
use crate::error::{StrideError, StrideResult};
use crate::frame::Frame;
use crate::pipeline::PipelineControl;

/// In-memory source producing gradient frames. Bounded when `total` is
/// `Some`, otherwise an endless live stream.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    fps: f64,
    total: Option<u64>,
    position: u64,
    /// Frame indices where a live grab transiently fails once.
    transient_failures: HashSet<u64>,
    failed_once: HashSet<u64>,
    /// Artificial per-read latency, for pacing-sensitive tests.
    read_delay: Option<std::time::Duration>,
    pub released: Arc<AtomicBool>,
}

impl SyntheticSource {
    pub fn bounded(total: u64) -> Self {
        Self::new(Some(total))
    }

    pub fn live() -> Self {
        Self::new(None)
    }

    fn new(total: Option<u64>) -> Self {
        Self {
            width: 16,
            height: 8,
            fps: 30.0,
            total,
            position: 0,
            transient_failures: HashSet::new(),
            failed_once: HashSet::new(),
            read_delay: None,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_transient_failures(mut self, frames: &[u64]) -> Self {
        self.transient_failures = frames.iter().copied().collect();
        self
    }

    pub fn with_read_delay(mut self, delay: std::time::Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Frame whose first pixel encodes its index, for ordering assertions.
    pub fn frame_at(&self, index: u64) -> Frame {
        let mut frame = Frame::black(self.width, self.height, index);
        frame.data[0] = (index % 251) as u8;
        frame.timestamp_ms = ((index as f64 / self.fps) * 1000.0) as u64;
        frame
    }

    pub fn release_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }
}

impl CaptureSource for SyntheticSource {
    fn read(&mut self) -> StrideResult<ReadOutcome> {
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }
        if let Some(total) = self.total {
            if self.position >= total {
                return Ok(ReadOutcome::EndOfStream);
            }
        }
        if self.transient_failures.contains(&self.position)
            && self.failed_once.insert(self.position)
        {
            return Ok(ReadOutcome::Again);
        }
        let frame = self.frame_at(self.position);
        self.position += 1;
        Ok(ReadOutcome::Frame(frame))
    }

    fn seek(&mut self, frame_index: u64) -> StrideResult<()> {
        match self.total {
            Some(total) => {
                self.position = frame_index.min(total.saturating_sub(1));
                Ok(())
            }
            None => Err(StrideError::SeekUnsupported(
                "synthetic live stream".to_string(),
            )),
        }
    }

    fn frame_count(&self) -> Option<u64> {
        self.total
    }

    fn frame_rate(&self) -> f64 {
        self.fps
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Passes frames through and counts invocations.
pub struct CountingAnnotator {
    pub calls: u64,
}

impl CountingAnnotator {
    pub fn new() -> Self {
        Self { calls: 0 }
    }
}

impl Annotator for CountingAnnotator {
    fn annotate(&mut self, frame: &Frame) -> StrideResult<Frame> {
        self.calls += 1;
        Ok(frame.clone())
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

/// Fails on the N-th call (1-based) with a fixed message.
pub struct FailingAnnotator {
    fail_on_call: u64,
    calls: u64,
    message: String,
}

impl FailingAnnotator {
    pub fn new(fail_on_call: u64, message: &str) -> Self {
        Self {
            fail_on_call,
            calls: 0,
            message: message.to_string(),
        }
    }
}

impl Annotator for FailingAnnotator {
    fn annotate(&mut self, frame: &Frame) -> StrideResult<Frame> {
        self.calls += 1;
        if self.calls == self.fail_on_call {
            return Err(StrideError::Annotation(self.message.clone()));
        }
        Ok(frame.clone())
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Requests cancellation after annotating its K-th frame, so the stop flag
/// is set mid-iteration and observed at the next boundary.
pub struct StopAfterAnnotator {
    control: Arc<PipelineControl>,
    stop_after: u64,
    calls: u64,
}

impl StopAfterAnnotator {
    pub fn new(control: Arc<PipelineControl>, stop_after: u64) -> Self {
        Self {
            control,
            stop_after,
            calls: 0,
        }
    }
}

impl Annotator for StopAfterAnnotator {
    fn annotate(&mut self, frame: &Frame) -> StrideResult<Frame> {
        self.calls += 1;
        if self.calls == self.stop_after {
            self.control.request_stop();
        }
        Ok(frame.clone())
    }

    fn name(&self) -> &'static str {
        "stop-after"
    }
}
