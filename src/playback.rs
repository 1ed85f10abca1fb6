//! Transport controller: raw-preview seek/step/play over a bounded source.
//!
//! Independent of the processing pipeline. The source moves into a dedicated
//! thread (so nothing else can read it), which answers seek/step commands
//! with single frames and, while playing, auto-advances at `fps * speed`.

use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::capture::{CaptureSource, ReadOutcome};
use crate::error::{StrideError, StrideResult};
use crate::frame::Frame;

/// Speed presets surfaced in the transport bar.
pub const SPEED_PRESETS: [f32; 7] = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

#[derive(Debug, Clone, Copy)]
pub enum TransportCommand {
    /// Absolute seek; shows the frame at the target index.
    SeekTo(u64),
    /// Relative step from the last shown frame.
    Step(i64),
    Play,
    Pause,
    SetSpeed(f32),
    Shutdown,
}

pub struct TransportController {
    commands: Sender<TransportCommand>,
    frames: flume::Receiver<Frame>,
    handle: Option<JoinHandle<()>>,
    frame_count: u64,
    frame_rate: f64,
    dimensions: (u32, u32),
}

impl TransportController {
    /// Move a bounded source into the transport thread.
    pub fn spawn<S>(source: S) -> StrideResult<TransportController>
    where
        S: CaptureSource + 'static,
    {
        let frame_count = source.frame_count().ok_or_else(|| {
            StrideError::SeekUnsupported("transport requires a bounded source".to_string())
        })?;
        let frame_rate = source.frame_rate();
        let dimensions = source.dimensions();

        let (commands_tx, commands_rx) = bounded::<TransportCommand>(16);
        let (frames_tx, frames_rx) = flume::unbounded::<Frame>();

        let handle = std::thread::Builder::new()
            .name("transport".to_string())
            .spawn(move || transport_loop(source, commands_rx, frames_tx))
            .expect("failed to spawn transport thread");

        Ok(TransportController {
            commands: commands_tx,
            frames: frames_rx,
            handle: Some(handle),
            frame_count,
            frame_rate,
            dimensions,
        })
    }

    /// Raw preview frames emitted by seeks, steps and playback.
    pub fn frames(&self) -> &flume::Receiver<Frame> {
        &self.frames
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    pub fn seek_to(&self, frame_index: u64) {
        let _ = self.commands.send(TransportCommand::SeekTo(frame_index));
    }

    pub fn step(&self, delta: i64) {
        let _ = self.commands.send(TransportCommand::Step(delta));
    }

    pub fn play(&self) {
        let _ = self.commands.send(TransportCommand::Play);
    }

    pub fn pause(&self) {
        let _ = self.commands.send(TransportCommand::Pause);
    }

    pub fn set_speed(&self, speed: f32) {
        let _ = self.commands.send(TransportCommand::SetSpeed(speed));
    }

    /// Stop the thread and release the source.
    pub fn shutdown(mut self) {
        let _ = self.commands.send(TransportCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TransportController {
    fn drop(&mut self) {
        let _ = self.commands.send(TransportCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn transport_loop<S: CaptureSource>(
    mut source: S,
    commands: Receiver<TransportCommand>,
    frames: flume::Sender<Frame>,
) {
    let total = source.frame_count().unwrap_or(0);
    let fps = source.frame_rate().max(1.0);
    let last_index = total.saturating_sub(1);

    let mut playing = false;
    let mut speed = 1.0f32;
    // Index of the next frame a read would produce.
    let mut position: u64 = 0;

    loop {
        let timeout = if playing {
            Duration::from_secs_f64(1.0 / (fps * speed as f64))
        } else {
            Duration::from_millis(250)
        };

        match commands.recv_timeout(timeout) {
            Ok(TransportCommand::SeekTo(index)) => {
                let target = index.min(last_index);
                if emit_at(&mut source, &frames, target).is_ok() {
                    position = target + 1;
                }
            }
            Ok(TransportCommand::Step(delta)) => {
                let shown = position.saturating_sub(1) as i64;
                let target = (shown + delta).clamp(0, last_index as i64) as u64;
                if emit_at(&mut source, &frames, target).is_ok() {
                    position = target + 1;
                }
            }
            Ok(TransportCommand::Play) => playing = true,
            Ok(TransportCommand::Pause) => playing = false,
            Ok(TransportCommand::SetSpeed(s)) => {
                if s > 0.0 {
                    speed = s;
                }
            }
            Ok(TransportCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if !playing {
                    continue;
                }
                match source.read() {
                    Ok(ReadOutcome::Frame(frame)) => {
                        position = frame.frame_number + 1;
                        if frames.send(frame).is_err() {
                            break;
                        }
                    }
                    Ok(ReadOutcome::EndOfStream) => playing = false,
                    Ok(ReadOutcome::Again) => {}
                    Err(e) => {
                        log::warn!("[TRANSPORT] Read failed: {}", e);
                        playing = false;
                    }
                }
            }
        }
    }

    source.release();
    log::debug!("[TRANSPORT] Thread shutting down");
}

/// Seek to `index` and emit that single frame.
fn emit_at<S: CaptureSource>(
    source: &mut S,
    frames: &flume::Sender<Frame>,
    index: u64,
) -> StrideResult<()> {
    source.seek(index)?;
    match source.read()? {
        ReadOutcome::Frame(frame) => {
            let _ = frames.send(frame);
            Ok(())
        }
        _ => Err(StrideError::Other(format!("no frame at index {}", index))),
    }
}
