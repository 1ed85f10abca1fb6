//! Annotators: pluggable frame -> annotated-frame capabilities.
//!
//! The pipeline only sees the `Annotator` trait; the concrete overlay
//! (pose skeleton vs generic detection boxes) is chosen at construction.

mod generic;
mod pose;

pub use generic::GenericAnnotator;
pub use pose::PoseAnnotator;

use crate::config::{AppConfig, ModelTask};
use crate::error::StrideResult;
use crate::frame::Frame;
use crate::model::load_model;

/// Maps an input frame to an annotated output frame.
///
/// A failure is capability-specific and fatal to the processing session.
pub trait Annotator: Send {
    fn annotate(&mut self, frame: &Frame) -> StrideResult<Frame>;

    /// Short label for logs and status lines.
    fn name(&self) -> &'static str;
}

/// Identity annotator: passes frames through untouched. Useful when running
/// the transport/export path without a model.
pub struct IdentityAnnotator;

impl Annotator for IdentityAnnotator {
    fn annotate(&mut self, frame: &Frame) -> StrideResult<Frame> {
        Ok(frame.clone())
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

/// Build the annotator for a task, loading (or sharing) its checkpoint.
pub fn annotator_for_task(config: &AppConfig, task: ModelTask) -> StrideResult<Box<dyn Annotator>> {
    let checkpoint = config.checkpoint_path(task);
    let model = load_model(&checkpoint, config.model_input_size)?;
    Ok(match task {
        ModelTask::Pose => Box::new(PoseAnnotator::new(model, config.confidence_threshold)),
        _ => Box::new(GenericAnnotator::new(model)),
    })
}
