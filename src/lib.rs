//! Stride Studio core: video annotation pipeline.
//!
//! Reads frames from a file or live camera, runs a pretrained pose/detection
//! model over each one, streams annotated previews and progress to the
//! caller, and optionally drains the buffered result into a video file.
//!
//! The background worker ([`pipeline::ProcessingSession`]) is the only
//! long-blocking component; everything else (capture reads, transport
//! control, export) runs on demand.

pub mod annotate;
pub mod capture;
pub mod config;
pub mod error;
pub mod export;
pub mod ffmpeg;
pub mod frame;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod playback;

#[cfg(test)]
pub(crate) mod testutil;

pub use annotate::{annotator_for_task, Annotator};
pub use capture::{CameraSource, CaptureSource, FileSource, ReadOutcome};
pub use config::{AppConfig, ModelTask};
pub use error::{StrideError, StrideResult};
pub use export::{export_video, Codec, ExportSummary};
pub use frame::{Frame, Rotation, SharedRotation};
pub use pipeline::{
    PipelineEvent, ProcessingSession, ProgressUpdate, SessionConfig, SessionInput, SessionReport,
    SessionState,
};
pub use playback::TransportController;
