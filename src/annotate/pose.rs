//! Pose overlay: 17-keypoint COCO skeleton.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::error::StrideResult;
use crate::frame::Frame;
use crate::model::yolo::{decode_pose, Keypoint, POSE_KEYPOINTS};
use crate::model::ModelHandle;

use super::Annotator;

/// Bone connections between COCO keypoint indices.
const SKELETON: [(usize, usize); 17] = [
    (15, 13),
    (13, 11),
    (16, 14),
    (14, 12),
    (11, 12),
    (5, 11),
    (6, 12),
    (5, 6),
    (5, 7),
    (6, 8),
    (7, 9),
    (8, 10),
    (5, 3),
    (6, 4),
    (3, 1),
    (4, 2),
    (1, 2),
];

const JOINT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BONE_COLOR: Rgb<u8> = Rgb([0, 255, 255]);
const JOINT_RADIUS: i32 = 4;
const BONE_WIDTH: i32 = 3;

/// Minimum box confidence for a person candidate.
const BOX_CONF: f32 = 0.25;

pub struct PoseAnnotator {
    model: ModelHandle,
    /// Keypoint confidence floor below which joints/bones are not drawn.
    keypoint_threshold: f32,
}

impl PoseAnnotator {
    pub fn new(model: ModelHandle, keypoint_threshold: f32) -> Self {
        Self {
            model,
            keypoint_threshold,
        }
    }
}

impl Annotator for PoseAnnotator {
    fn annotate(&mut self, frame: &Frame) -> StrideResult<Frame> {
        let (output, input_size) = {
            let mut model = self.model.lock();
            (model.infer(frame)?, model.input_size())
        };
        let scale_x = frame.width as f32 / input_size as f32;
        let scale_y = frame.height as f32 / input_size as f32;
        let poses = decode_pose(&output.shape, &output.data, BOX_CONF, scale_x, scale_y)?;

        let mut canvas = frame.to_rgb_image();
        for pose in &poses {
            if pose.keypoints.len() != POSE_KEYPOINTS {
                continue;
            }
            draw_skeleton(&mut canvas, &pose.keypoints, self.keypoint_threshold);
        }

        Ok(Frame::from_rgb_image(
            canvas,
            frame.frame_number,
            frame.timestamp_ms,
        ))
    }

    fn name(&self) -> &'static str {
        "pose"
    }
}

/// Draw bones then joints for one person.
///
/// An endpoint is only drawn when its confidence clears the threshold and it
/// lies strictly inside the frame.
pub(crate) fn draw_skeleton(canvas: &mut RgbImage, keypoints: &[Keypoint], threshold: f32) {
    let (w, h) = (canvas.width() as f32, canvas.height() as f32);
    let inside = |k: &Keypoint| k.x > 0.0 && k.x < w && k.y > 0.0 && k.y < h;

    for (a, b) in SKELETON {
        let (ka, kb) = (&keypoints[a], &keypoints[b]);
        if ka.confidence < threshold || kb.confidence < threshold {
            continue;
        }
        if inside(ka) && inside(kb) {
            draw_thick_line(canvas, (ka.x, ka.y), (kb.x, kb.y), BONE_WIDTH, BONE_COLOR);
        }
    }

    for k in keypoints {
        if k.confidence >= threshold && inside(k) {
            draw_filled_circle_mut(
                canvas,
                (k.x.round() as i32, k.y.round() as i32),
                JOINT_RADIUS,
                JOINT_COLOR,
            );
        }
    }
}

/// Approximate a line of `width` pixels by offsetting 1 px segments across
/// the minor axis.
fn draw_thick_line(
    canvas: &mut RgbImage,
    from: (f32, f32),
    to: (f32, f32),
    width: i32,
    color: Rgb<u8>,
) {
    let half = width / 2;
    let steep = (to.1 - from.1).abs() > (to.0 - from.0).abs();
    for offset in -half..=half {
        let o = offset as f32;
        let (df, dt) = if steep {
            ((from.0 + o, from.1), (to.0 + o, to.1))
        } else {
            ((from.0, from.1 + o), (to.0, to.1 + o))
        };
        draw_line_segment_mut(canvas, df, dt, color);
    }
}
