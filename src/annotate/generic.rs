//! Generic overlay for detection/segmentation/classification checkpoints:
//! class-colored bounding boxes.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::error::StrideResult;
use crate::frame::Frame;
use crate::model::yolo::{decode_detections, Detection};
use crate::model::ModelHandle;

use super::Annotator;

/// Minimum detection confidence for the overlay.
const CONF: f32 = 0.25;
const BOX_WIDTH: u32 = 2;

/// Stable per-class colors, cycled by class id.
const PALETTE: [[u8; 3]; 10] = [
    [56, 56, 255],
    [151, 157, 255],
    [31, 112, 255],
    [29, 178, 255],
    [49, 210, 207],
    [10, 249, 72],
    [23, 204, 146],
    [134, 219, 61],
    [52, 147, 26],
    [187, 212, 0],
];

pub struct GenericAnnotator {
    model: ModelHandle,
}

impl GenericAnnotator {
    pub fn new(model: ModelHandle) -> Self {
        Self { model }
    }
}

impl Annotator for GenericAnnotator {
    fn annotate(&mut self, frame: &Frame) -> StrideResult<Frame> {
        let (output, input_size) = {
            let mut model = self.model.lock();
            (model.infer(frame)?, model.input_size())
        };
        let scale_x = frame.width as f32 / input_size as f32;
        let scale_y = frame.height as f32 / input_size as f32;
        let detections = decode_detections(&output.shape, &output.data, CONF, scale_x, scale_y)?;

        let mut canvas = frame.to_rgb_image();
        for detection in &detections {
            draw_detection(&mut canvas, detection);
        }

        Ok(Frame::from_rgb_image(
            canvas,
            frame.frame_number,
            frame.timestamp_ms,
        ))
    }

    fn name(&self) -> &'static str {
        "generic"
    }
}

pub(crate) fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Draw one detection as a hollow box clamped to the canvas.
pub(crate) fn draw_detection(canvas: &mut RgbImage, detection: &Detection) {
    let (w, h) = (canvas.width() as i32, canvas.height() as i32);
    let x1 = (detection.bbox.x1 as i32).clamp(0, w - 1);
    let y1 = (detection.bbox.y1 as i32).clamp(0, h - 1);
    let x2 = (detection.bbox.x2 as i32).clamp(0, w - 1);
    let y2 = (detection.bbox.y2 as i32).clamp(0, h - 1);
    if x2 <= x1 || y2 <= y1 {
        return;
    }

    let color = class_color(detection.class_id);
    for inset in 0..BOX_WIDTH as i32 {
        let bw = x2 - x1 - 2 * inset;
        let bh = y2 - y1 - 2 * inset;
        if bw <= 0 || bh <= 0 {
            break;
        }
        draw_hollow_rect_mut(
            canvas,
            Rect::at(x1 + inset, y1 + inset).of_size(bw as u32, bh as u32),
            color,
        );
    }
}
