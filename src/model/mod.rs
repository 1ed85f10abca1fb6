//! Pretrained-model capability: ONNX Runtime sessions plus the process-wide
//! cache that shares them across annotators.

mod cache;
pub mod yolo;

pub use cache::{load_model, ModelHandle};

use std::path::Path;

use image::imageops;
use ort::session::{builder::GraphOptimizationLevel, Session};

use crate::error::{StrideError, StrideResult};
use crate::frame::Frame;

/// Raw model output: tensor dimensions plus a flat f32 buffer.
pub struct RawOutput {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// One loaded ONNX session with its fixed square input size.
pub struct InferenceModel {
    session: Session,
    input_size: u32,
}

impl InferenceModel {
    /// Load a checkpoint from disk.
    pub fn load(path: &Path, input_size: u32) -> StrideResult<Self> {
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| StrideError::Model(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            session,
            input_size,
        })
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Run the model over one frame and return the first output tensor.
    ///
    /// The frame is resized (not letterboxed) to the square model input and
    /// normalized to [0, 1] CHW, matching how the checkpoints were exported.
    pub fn infer(&mut self, frame: &Frame) -> StrideResult<RawOutput> {
        let side = self.input_size;
        let resized = imageops::resize(
            &frame.to_rgb_image(),
            side,
            side,
            imageops::FilterType::Triangle,
        );

        let hw = (side * side) as usize;
        let mut input = vec![0f32; 3 * hw];
        for (i, pixel) in resized.pixels().enumerate() {
            input[i] = pixel.0[0] as f32 / 255.0;
            input[hw + i] = pixel.0[1] as f32 / 255.0;
            input[2 * hw + i] = pixel.0[2] as f32 / 255.0;
        }

        let tensor = ort::value::Tensor::from_array((
            [1usize, 3, side as usize, side as usize],
            input,
        ))
        .map_err(|e| StrideError::Annotation(format!("input tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| StrideError::Annotation(format!("session run failed: {}", e)))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| StrideError::Annotation(format!("output tensor: {}", e)))?;

        Ok(RawOutput {
            shape: shape.iter().map(|d| *d as usize).collect(),
            data: data.to_vec(),
        })
    }
}
