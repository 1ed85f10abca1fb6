//! Frame buffer type and rotation.
//!
//! Frames are raw RGB24 (3 bytes per pixel, row-major) so they can be piped
//! straight into FFmpeg for decode/encode without conversions.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use image::{imageops, RgbImage};

/// A decoded video frame ready for annotation or encoding.
#[derive(Clone)]
pub struct Frame {
    /// Raw RGB24 pixel data, `width * height * 3` bytes.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Index of this frame within its source.
    pub frame_number: u64,
    pub timestamp_ms: u64,
}

impl Frame {
    /// Bytes per RGB24 frame at the given dimensions.
    pub fn byte_len(width: u32, height: u32) -> usize {
        (width as usize) * (height as usize) * 3
    }

    /// Build a black frame. Used as a placeholder and in tests.
    pub fn black(width: u32, height: u32, frame_number: u64) -> Self {
        Self {
            data: vec![0u8; Self::byte_len(width, height)],
            width,
            height,
            frame_number,
            timestamp_ms: 0,
        }
    }

    /// View this frame as an `RgbImage` (copies the pixel data).
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    /// Rebuild a frame from an `RgbImage`, keeping number and timestamp.
    pub fn from_rgb_image(img: RgbImage, frame_number: u64, timestamp_ms: u64) -> Self {
        let (width, height) = img.dimensions();
        Self {
            data: img.into_raw(),
            width,
            height,
            frame_number,
            timestamp_ms,
        }
    }

    /// Rotate clockwise by the given angle. 90/270 swap the dimensions.
    pub fn rotate(&self, rotation: Rotation) -> Frame {
        if rotation == Rotation::None {
            return self.clone();
        }
        let img = self.to_rgb_image();
        let rotated = match rotation {
            Rotation::None => img,
            Rotation::Cw90 => imageops::rotate90(&img),
            Rotation::Cw180 => imageops::rotate180(&img),
            Rotation::Cw270 => imageops::rotate270(&img),
        };
        Frame::from_rgb_image(rotated, self.frame_number, self.timestamp_ms)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frame_number", &self.frame_number)
            .field("timestamp_ms", &self.timestamp_ms)
            .finish()
    }
}

/// Clockwise rotation applied uniformly to every frame before annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Parse from degrees; any multiple of 360 reduces first.
    pub fn from_degrees(degrees: u32) -> Option<Rotation> {
        match degrees % 360 {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Cw90),
            180 => Some(Rotation::Cw180),
            270 => Some(Rotation::Cw270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// The next 90-degree step, cycling back to 0 after 270.
    pub fn next(self) -> Rotation {
        match self {
            Rotation::None => Rotation::Cw90,
            Rotation::Cw90 => Rotation::Cw180,
            Rotation::Cw180 => Rotation::Cw270,
            Rotation::Cw270 => Rotation::None,
        }
    }
}

/// Rotation cell shared between the UI side and the processing loop.
///
/// The loop reads it at every iteration, so a rotate action takes effect on
/// the next frame without restarting the session.
#[derive(Debug, Default)]
pub struct SharedRotation {
    degrees: AtomicU16,
}

impl SharedRotation {
    pub fn new(rotation: Rotation) -> Arc<Self> {
        Arc::new(Self {
            degrees: AtomicU16::new(rotation.degrees() as u16),
        })
    }

    pub fn get(&self) -> Rotation {
        Rotation::from_degrees(self.degrees.load(Ordering::Relaxed) as u32)
            .unwrap_or(Rotation::None)
    }

    pub fn set(&self, rotation: Rotation) {
        self.degrees
            .store(rotation.degrees() as u16, Ordering::Relaxed);
    }

    /// Advance by 90 degrees and return the new value.
    pub fn rotate_step(&self) -> Rotation {
        let next = self.get().next();
        self.set(next);
        next
    }
}
