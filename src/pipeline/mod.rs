//! Background processing pipeline.
//!
//! One worker thread reads frames, rotates, annotates, buffers (file mode)
//! and streams previews/progress back to the caller. Pause/resume and
//! cancellation are cooperative, observed at iteration boundaries.

mod control;
mod worker;

#[cfg(test)]
mod tests;

pub use control::PipelineControl;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use uuid::Uuid;

use crate::annotate::Annotator;
use crate::capture::CaptureSource;
use crate::frame::{Frame, Rotation, SharedRotation};

/// Processing session lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Running,
    Paused,
    Completed,
    Cancelled,
    Failed { reason: String },
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::Failed { .. }
        )
    }
}

/// Progress published once per processed frame.
///
/// Bounded sessions report a percentage; unbounded sessions report the
/// processed-frame count (there is no meaningful percentage for a live
/// stream).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUpdate {
    Percent(u8),
    Live { frames: u64 },
}

/// Events pushed out of the worker. Frames are owned copies; the caller
/// never sees the worker's buffer while it is running.
#[derive(Debug)]
pub enum PipelineEvent {
    Preview(Frame),
    Progress(ProgressUpdate),
    Finished(SessionState),
}

/// What the worker reads from.
pub enum SessionInput {
    /// The worker opens a bounded file source itself and releases it on any
    /// terminal transition.
    Path(PathBuf),
    /// A pre-opened source supplied by the caller (e.g. a live camera). The
    /// worker never releases it; it comes back in the [`SessionReport`].
    Supplied(Box<dyn CaptureSource>),
}

/// Per-session parameters.
pub struct SessionConfig {
    /// First frame to process (bounded sources seek here before the loop).
    pub start_frame: u64,
    /// Exclusive end bound; `None` means the whole source (or unbounded).
    pub end_frame: Option<u64>,
    /// Rotation applied to every frame before annotation; shared so a user
    /// action takes effect mid-session.
    pub rotation: Arc<SharedRotation>,
    /// Publish `Preview` events. Disable for headless batch runs.
    pub preview: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start_frame: 0,
            end_frame: None,
            rotation: SharedRotation::new(Rotation::None),
            preview: true,
        }
    }
}

/// Terminal result of one session.
pub struct SessionReport {
    pub state: SessionState,
    /// Annotated frames in processing order. Empty for live sessions.
    pub frames: Vec<Frame>,
    /// Frame rate recorded from the source, for the exporter.
    pub fps: f64,
    /// A supplied source handed back to the caller (never for path inputs).
    pub source: Option<Box<dyn CaptureSource>>,
}

/// Handle to a running (or finished) processing session.
pub struct ProcessingSession {
    id: Uuid,
    control: Arc<PipelineControl>,
    events: Receiver<PipelineEvent>,
    status: Arc<parking_lot::Mutex<SessionState>>,
    handle: Option<JoinHandle<SessionReport>>,
}

impl ProcessingSession {
    /// Spawn the worker thread. Requires a valid input and annotator; an
    /// unopenable path input surfaces as a `Failed` terminal state.
    pub fn start(
        input: SessionInput,
        annotator: Box<dyn Annotator>,
        config: SessionConfig,
        fallback_fps: f64,
    ) -> ProcessingSession {
        Self::start_with_control(input, annotator, config, fallback_fps, PipelineControl::new())
    }

    /// As [`start`](Self::start), with a caller-provided control (useful when
    /// another component needs the pause/stop handle before spawn).
    pub fn start_with_control(
        input: SessionInput,
        annotator: Box<dyn Annotator>,
        config: SessionConfig,
        fallback_fps: f64,
        control: Arc<PipelineControl>,
    ) -> ProcessingSession {
        let id = Uuid::new_v4();
        let (events_tx, events_rx) = unbounded();
        let status = Arc::new(parking_lot::Mutex::new(SessionState::Idle));

        let worker_control = Arc::clone(&control);
        let worker_status = Arc::clone(&status);
        let handle = std::thread::Builder::new()
            .name(format!("pipeline-{}", id.simple()))
            .spawn(move || {
                worker::run(
                    input,
                    annotator,
                    config,
                    fallback_fps,
                    worker_control,
                    worker_status,
                    events_tx,
                )
            })
            .expect("failed to spawn pipeline worker");

        log::info!("[PIPELINE] Session {} started", id.simple());

        ProcessingSession {
            id,
            control,
            events: events_rx,
            status,
            handle: Some(handle),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Event stream: previews, progress, then exactly one `Finished`.
    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }

    pub fn control(&self) -> Arc<PipelineControl> {
        Arc::clone(&self.control)
    }

    /// Current lifecycle state as seen from the caller's side. Terminal
    /// states also travel in the [`SessionReport`].
    pub fn state(&self) -> SessionState {
        self.status.lock().clone()
    }

    /// Block the worker before its next read. In-flight work is not dropped.
    pub fn pause(&self) {
        self.control.pause();
    }

    /// Wake exactly one blocked iteration.
    pub fn resume(&self) {
        self.control.resume();
    }

    /// Request cooperative cancellation (observed at the next iteration
    /// boundary, never mid-frame).
    pub fn cancel(&self) {
        self.control.request_stop();
    }

    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| h.is_finished())
            .unwrap_or(true)
    }

    /// Block until the worker reaches a terminal state.
    pub fn wait(mut self) -> SessionReport {
        let handle = self.handle.take().expect("session already joined");
        handle.join().unwrap_or_else(|_| SessionReport {
            state: SessionState::Failed {
                reason: "worker thread panicked".to_string(),
            },
            frames: Vec::new(),
            fps: 0.0,
            source: None,
        })
    }

    /// Cancel and wait up to `timeout` for the worker to acknowledge. On
    /// timeout the worker is abandoned (forced-stop fallback) and `None` is
    /// returned.
    pub fn stop(mut self, timeout: Duration) -> Option<SessionReport> {
        self.control.request_stop();

        let deadline = Instant::now() + timeout;
        let handle = self.handle.take().expect("session already joined");
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                log::warn!(
                    "[PIPELINE] Session {} did not stop within {:?}; abandoning worker",
                    self.id.simple(),
                    timeout
                );
                return None;
            }
            // Poll for the terminal transition, draining events meanwhile.
            let _ = self.events.recv_timeout(Duration::from_millis(10));
        }

        Some(handle.join().unwrap_or_else(|_| SessionReport {
            state: SessionState::Failed {
                reason: "worker thread panicked".to_string(),
            },
            frames: Vec::new(),
            fps: 0.0,
            source: None,
        }))
    }
}
