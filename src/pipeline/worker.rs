//! The processing loop itself.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::annotate::Annotator;
use crate::capture::{CaptureSource, FileSource, ReadOutcome};
use crate::frame::{Frame, Rotation};

use super::control::PipelineControl;
use super::{PipelineEvent, ProgressUpdate, SessionConfig, SessionInput, SessionReport, SessionState};

/// Backoff after a transient live-source read failure.
const TRANSIENT_RETRY_DELAY: Duration = Duration::from_millis(10);

pub(super) fn run(
    input: SessionInput,
    mut annotator: Box<dyn Annotator>,
    config: SessionConfig,
    fallback_fps: f64,
    control: Arc<PipelineControl>,
    status: Arc<parking_lot::Mutex<SessionState>>,
    events: Sender<PipelineEvent>,
) -> SessionReport {
    let set_status = |state: SessionState| *status.lock() = state;
    // Prepare the source. Opening failures are fatal to the session.
    let (mut source, self_opened): (Box<dyn CaptureSource>, bool) = match input {
        SessionInput::Path(path) => match FileSource::open(&path, fallback_fps) {
            Ok(source) => (Box::new(source), true),
            Err(e) => {
                log::error!("[PIPELINE] {}", e);
                let state = SessionState::Failed {
                    reason: e.to_string(),
                };
                set_status(state.clone());
                return finish(state, Vec::new(), fallback_fps, None, &events);
            }
        },
        SessionInput::Supplied(source) => (source, false),
    };

    let live = source.is_live();
    let fps = source.frame_rate();
    let start = config.start_frame;
    let end = match (config.end_frame, source.frame_count()) {
        (Some(end), Some(total)) => end.min(total),
        (None, Some(total)) => total,
        (Some(end), None) => end,
        (None, None) => u64::MAX,
    };
    let span = end.saturating_sub(start).max(1);

    if !live && start > 0 {
        if let Err(e) = source.seek(start) {
            let state = SessionState::Failed {
                reason: format!("cannot seek to frame {}: {}", start, e),
            };
            set_status(state.clone());
            release(&mut source, self_opened);
            return finish(state, Vec::new(), fps, keep(source, self_opened), &events);
        }
    }

    set_status(SessionState::Running);

    log::info!(
        "[PIPELINE] Processing with {} annotator: frames {}..{}{}",
        annotator.name(),
        start,
        if end == u64::MAX { "unbounded".to_string() } else { end.to_string() },
        if live { " (live)" } else { "" }
    );

    let mut current = start;
    let mut buffer: Vec<Frame> = Vec::new();

    let terminal = loop {
        if current >= end {
            break SessionState::Completed;
        }

        // Pause blocks here, before the next read; a stop request is only
        // honored at this boundary.
        let was_paused = control.is_paused();
        if was_paused {
            set_status(SessionState::Paused);
        }
        if control.wait_if_paused() {
            break SessionState::Cancelled;
        }
        if was_paused {
            set_status(SessionState::Running);
        }

        let raw = match source.read() {
            Ok(ReadOutcome::Frame(frame)) => frame,
            Ok(ReadOutcome::EndOfStream) => {
                if !live && current < end {
                    log::warn!("[PIPELINE] Early end of stream at frame {}", current);
                }
                break SessionState::Completed;
            }
            Ok(ReadOutcome::Again) => {
                std::thread::sleep(TRANSIENT_RETRY_DELAY);
                continue;
            }
            Err(e) => {
                log::error!("[PIPELINE] Read failed at frame {}: {}", current, e);
                break SessionState::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let rotation = config.rotation.get();
        let rotated = if rotation == Rotation::None {
            raw
        } else {
            raw.rotate(rotation)
        };

        let annotated = match annotator.annotate(&rotated) {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("[PIPELINE] Annotation failed at frame {}: {}", current, e);
                break SessionState::Failed {
                    reason: e.to_string(),
                };
            }
        };

        // Live sessions never retain history.
        if !live {
            buffer.push(annotated.clone());
        }

        if config.preview {
            let _ = events.send(PipelineEvent::Preview(annotated));
        }

        current += 1;
        let progress = if live {
            ProgressUpdate::Live {
                frames: current - start,
            }
        } else {
            ProgressUpdate::Percent((100 * (current - start) / span) as u8)
        };
        let _ = events.send(PipelineEvent::Progress(progress));
    };

    // Terminal transition: reclaim buffer memory, release a self-opened
    // source, hand a supplied one back.
    set_status(terminal.clone());
    buffer.shrink_to_fit();
    release(&mut source, self_opened);
    let returned = keep(source, self_opened);

    log::info!(
        "[PIPELINE] Session finished: {:?} ({} frames buffered)",
        terminal,
        buffer.len()
    );

    finish(terminal, buffer, fps, returned, &events)
}

fn release(source: &mut Box<dyn CaptureSource>, self_opened: bool) {
    if self_opened {
        source.release();
    }
}

fn keep(source: Box<dyn CaptureSource>, self_opened: bool) -> Option<Box<dyn CaptureSource>> {
    if self_opened {
        None
    } else {
        Some(source)
    }
}

fn finish(
    state: SessionState,
    frames: Vec<Frame>,
    fps: f64,
    source: Option<Box<dyn CaptureSource>>,
    events: &Sender<PipelineEvent>,
) -> SessionReport {
    let _ = events.send(PipelineEvent::Finished(state.clone()));
    SessionReport {
        state,
        frames,
        fps,
        source,
    }
}
