//! Decoding of YOLO-style output tensors.
//!
//! Pose checkpoints emit `[1, 56, N]` (cx, cy, w, h, conf, 17 x (x, y, conf));
//! detection checkpoints emit `[1, 4 + classes, N]`. Candidates are filtered
//! by confidence, mapped back to frame coordinates, and deduplicated with
//! greedy IoU NMS.

use crate::error::{StrideError, StrideResult};

/// COCO pose keypoints per person.
pub const POSE_KEYPOINTS: usize = 17;

/// Pose tensor attributes: box (4) + confidence (1) + keypoints (17 * 3).
const POSE_ATTRS: usize = 5 + POSE_KEYPOINTS * 3;

/// Default IoU threshold for NMS.
pub const NMS_IOU_THRESHOLD: f32 = 0.45;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection-over-union with another box.
    pub fn iou(&self, other: &BBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    fn scaled(&self, sx: f32, sy: f32) -> BBox {
        BBox {
            x1: self.x1 * sx,
            y1: self.y1 * sy,
            x2: self.x2 * sx,
            y2: self.y2 * sy,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

/// One detected person with its 17 keypoints.
#[derive(Debug, Clone)]
pub struct PoseDetection {
    pub bbox: BBox,
    pub score: f32,
    pub keypoints: Vec<Keypoint>,
}

/// One detected object.
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: BBox,
    pub class_id: usize,
    pub score: f32,
}

/// Decode a pose tensor. `scale_x`/`scale_y` map model-input coordinates
/// back to frame coordinates.
pub fn decode_pose(
    shape: &[usize],
    data: &[f32],
    conf_threshold: f32,
    scale_x: f32,
    scale_y: f32,
) -> StrideResult<Vec<PoseDetection>> {
    let (attrs, candidates) = tensor_layout(shape, data, POSE_ATTRS)?;

    let mut detections = Vec::new();
    for i in 0..candidates {
        let at = |attr: usize| data[attr * candidates + i];
        let score = at(4);
        if score < conf_threshold {
            continue;
        }

        let bbox = BBox::from_cxcywh(at(0), at(1), at(2), at(3)).scaled(scale_x, scale_y);
        let mut keypoints = Vec::with_capacity(POSE_KEYPOINTS);
        for k in 0..POSE_KEYPOINTS {
            let base = 5 + k * 3;
            if base + 2 >= attrs {
                break;
            }
            keypoints.push(Keypoint {
                x: at(base) * scale_x,
                y: at(base + 1) * scale_y,
                confidence: at(base + 2),
            });
        }
        detections.push(PoseDetection {
            bbox,
            score,
            keypoints,
        });
    }

    Ok(nms(detections, NMS_IOU_THRESHOLD, |d| d.bbox, |d| d.score))
}

/// Decode a detection tensor with `4 + classes` attributes per candidate.
pub fn decode_detections(
    shape: &[usize],
    data: &[f32],
    conf_threshold: f32,
    scale_x: f32,
    scale_y: f32,
) -> StrideResult<Vec<Detection>> {
    let (attrs, candidates) = tensor_layout(shape, data, 5)?;
    let classes = attrs - 4;

    let mut detections = Vec::new();
    for i in 0..candidates {
        let at = |attr: usize| data[attr * candidates + i];

        let mut class_id = 0;
        let mut score = f32::MIN;
        for c in 0..classes {
            let s = at(4 + c);
            if s > score {
                score = s;
                class_id = c;
            }
        }
        if score < conf_threshold {
            continue;
        }

        detections.push(Detection {
            bbox: BBox::from_cxcywh(at(0), at(1), at(2), at(3)).scaled(scale_x, scale_y),
            class_id,
            score,
        });
    }

    Ok(nms(detections, NMS_IOU_THRESHOLD, |d| d.bbox, |d| d.score))
}

/// Validate `[1, attrs, N]` layout and return (attrs, N).
fn tensor_layout(shape: &[usize], data: &[f32], min_attrs: usize) -> StrideResult<(usize, usize)> {
    if shape.len() != 3 || shape[0] != 1 {
        return Err(StrideError::Annotation(format!(
            "unexpected output shape {:?}",
            shape
        )));
    }
    let (attrs, candidates) = (shape[1], shape[2]);
    if attrs < min_attrs {
        return Err(StrideError::Annotation(format!(
            "output has {} attributes, need at least {}",
            attrs, min_attrs
        )));
    }
    if data.len() < attrs * candidates {
        return Err(StrideError::Annotation(format!(
            "output buffer too small: {} < {}",
            data.len(),
            attrs * candidates
        )));
    }
    Ok((attrs, candidates))
}

/// Greedy NMS: keep the best-scored item, drop everything overlapping it
/// past the IoU threshold, repeat.
fn nms<T>(
    mut items: Vec<T>,
    iou_threshold: f32,
    bbox: impl Fn(&T) -> BBox,
    score: impl Fn(&T) -> f32,
) -> Vec<T> {
    items.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<T> = Vec::new();
    for item in items {
        let candidate = bbox(&item);
        if kept.iter().all(|k| bbox(k).iou(&candidate) <= iou_threshold) {
            kept.push(item);
        }
    }
    kept
}
